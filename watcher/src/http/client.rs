//! Backend REST client

use std::time::Duration;

use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::errors::WatchError;

/// JSON client for the range backend REST API
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// `timeout` bounds every request.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, WatchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rangewatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// GET `path` under the base URL and decode the JSON body.
    ///
    /// 404 maps to `NotFound`, any other non-2xx status to `StatusError`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, WatchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(WatchError::NotFound(url));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "GET {} failed: {}", url, body);
            return Err(WatchError::StatusError(format!("{} from {}", status, url)));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| WatchError::ProtocolError(format!("decoding {}: {}", url, e)))
    }
}
