//! WebSocket client for the event push endpoint

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use http::header::{HeaderValue, USER_AGENT};
use range_api::{ClientMessage, ServerMessage};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};
use url::Url;

use crate::errors::WatchError;

/// Build the push endpoint URL.
///
/// An explicit `ws_url` wins. Otherwise the backend base URL is switched to
/// `ws`/`wss` and `/ws` is appended to its path.
pub fn build_ws_url(backend_url: &str, ws_url: Option<&str>) -> Result<Url, WatchError> {
    if let Some(explicit) = ws_url {
        let url = Url::parse(explicit).map_err(|e| WatchError::ConfigError(e.to_string()))?;
        return match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(WatchError::ConfigError(format!(
                "invalid websocket URL scheme: {}",
                other
            ))),
        };
    }

    let mut url = Url::parse(backend_url).map_err(|e| WatchError::ConfigError(e.to_string()))?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(WatchError::ConfigError(format!(
                "invalid backend URL scheme: {}",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| WatchError::ConfigError("failed to set websocket scheme".to_string()))?;
    url.set_path(&format!("{}/ws", url.path().trim_end_matches('/')));
    Ok(url)
}

/// One open WebSocket connection speaking the range event protocol
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    /// Connect, failing with `Timeout` if the handshake takes longer than `timeout`
    pub async fn connect(url: &Url, timeout: Duration) -> Result<Self, WatchError> {
        let mut request = url.as_str().into_client_request()?;
        request.headers_mut().insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("rangewatch/", env!("CARGO_PKG_VERSION"))),
        );

        let (stream, response) = tokio::time::timeout(timeout, connect_async(request))
            .await
            .map_err(|_| WatchError::Timeout(format!("connecting to {}", url)))??;
        debug!("WebSocket handshake complete: {}", response.status());

        Ok(Self { stream })
    }

    pub async fn send(&mut self, message: &ClientMessage) -> Result<(), WatchError> {
        let text = serde_json::to_string(message)?;
        trace!("-> {}", text);
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Next protocol message.
    ///
    /// Control frames are handled by the transport. A frame that does not
    /// decode yields `ProtocolError` and the connection stays usable.
    /// `None` means the peer closed the connection.
    pub async fn next_message(&mut self) -> Option<Result<ServerMessage, WatchError>> {
        loop {
            let frame = match self.stream.next().await? {
                Ok(frame) => frame,
                Err(e) => return Some(Err(e.into())),
            };
            match frame {
                Message::Text(text) => {
                    trace!("<- {}", text.as_str());
                    return Some(decode(text.as_bytes()));
                }
                Message::Binary(bytes) => return Some(decode(&bytes)),
                Message::Close(frame) => {
                    debug!("Peer closed connection: {:?}", frame);
                    return None;
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    /// Send a close frame. Errors are ignored since the peer may be gone.
    pub async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("Close handshake failed: {}", e);
        }
    }
}

fn decode(bytes: &[u8]) -> Result<ServerMessage, WatchError> {
    serde_json::from_slice(bytes).map_err(|e| WatchError::ProtocolError(e.to_string()))
}
