//! Deployment status API client

use async_trait::async_trait;
use range_api::DeploymentSnapshot;

use crate::errors::WatchError;
use crate::http::client::HttpClient;

/// Source of authoritative deployment snapshots, abstracted for testability
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fetch the current snapshot of a range
    async fn fetch_status(&self, range_id: &str) -> Result<DeploymentSnapshot, WatchError>;
}

impl HttpClient {
    /// Get the deployment status snapshot of a range
    pub async fn get_deployment_status(
        &self,
        range_id: &str,
    ) -> Result<DeploymentSnapshot, WatchError> {
        let path = format!("/ranges/{}/deployment-status", range_id);
        self.get(&path).await
    }
}

#[async_trait]
impl StatusSource for HttpClient {
    async fn fetch_status(&self, range_id: &str) -> Result<DeploymentSnapshot, WatchError> {
        self.get_deployment_status(range_id).await
    }
}
