//! Error types for the range watcher

use thiserror::Error;

/// Main error type for the range watcher
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Status endpoint error: {0}")]
    StatusError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for WatchError {
    fn from(err: anyhow::Error) -> Self {
        WatchError::Internal(err.to_string())
    }
}
