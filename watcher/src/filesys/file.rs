//! Read-only file handle for configuration files

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tokio::fs;

use crate::errors::WatchError;

#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

impl File {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Parse the file as JSON. Syntax errors are reported as configuration
    /// errors naming the file.
    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, WatchError> {
        let contents = fs::read_to_string(&self.path).await?;
        serde_json::from_str(&contents).map_err(|e| {
            WatchError::ConfigError(format!("{}: {}", self.path.display(), e))
        })
    }
}
