//! Application state management

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::app::options::AppOptions;
use crate::errors::WatchError;
use crate::http::client::HttpClient;
use crate::reconcile::DeploymentListener;
use crate::store::ResourceStore;
use crate::watch::{WatchContext, Watcher};

/// Capacity of the signal broadcast channel. Slow receivers lag and skip.
const SIGNAL_CAPACITY: usize = 256;

/// Main application state
pub struct AppState {
    /// HTTP client for the status endpoint
    pub http_client: Arc<HttpClient>,

    /// Watched ranges, their store and signals
    pub watcher: Arc<Watcher>,
}

impl AppState {
    /// Initialize application state
    pub fn init(
        options: &AppOptions,
        listener: Arc<dyn DeploymentListener>,
    ) -> Result<Self, WatchError> {
        info!("Initializing application state...");

        let http_client = Arc::new(HttpClient::new(
            &options.backend_base_url,
            options.poller.request_timeout,
        )?);

        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        let ctx = WatchContext {
            source: http_client.clone(),
            store: Arc::new(ResourceStore::new()),
            listener,
            signals,
            poller: options.poller.clone(),
            channel: options.channel.clone(),
            notifier: options.notifier.clone(),
        };

        Ok(Self {
            http_client,
            watcher: Arc::new(Watcher::new(ctx)),
        })
    }

    /// Shutdown application state
    pub fn shutdown(&self) {
        info!("Shutting down application state...");
        self.watcher.shutdown();
    }
}
