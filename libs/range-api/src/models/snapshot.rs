//! Deployment status snapshots

use serde::{Deserialize, Serialize};

use crate::models::status::{RangeStatus, ResourceState};

/// Status record of a router, network or VM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    /// Resource id, absent for the router
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Display label
    #[serde(default)]
    pub name: String,

    pub status: ResourceState,

    /// Human-readable explanation, e.g. an error cause
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_detail: Option<String>,

    /// Time spent in the current status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ResourceStatus {
    pub fn new(id: Option<String>, name: impl Into<String>, status: ResourceState) -> Self {
        Self {
            id,
            name: name.into(),
            status,
            status_detail: None,
            duration_ms: None,
        }
    }
}

/// Resource counts of a deployment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSummary {
    pub total: u32,
    pub completed: u32,
    pub in_progress: u32,
    pub failed: u32,
    pub pending: u32,
}

impl DeploymentSummary {
    /// Count the given resource statuses
    pub fn from_states<I>(states: I) -> Self
    where
        I: IntoIterator<Item = ResourceState>,
    {
        states.into_iter().fold(Self::default(), |mut summary, state| {
            summary.total += 1;
            match state {
                ResourceState::Pending => summary.pending += 1,
                ResourceState::Creating => summary.in_progress += 1,
                ResourceState::Failed => summary.failed += 1,
                ResourceState::Running | ResourceState::Created | ResourceState::Stopped => {
                    summary.completed += 1
                }
            }
            summary
        })
    }
}

/// Point-in-time view of a whole range, as returned by the status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSnapshot {
    pub status: RangeStatus,

    #[serde(default)]
    pub elapsed_seconds: u64,

    #[serde(default)]
    pub summary: DeploymentSummary,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router: Option<ResourceStatus>,

    #[serde(default)]
    pub networks: Vec<ResourceStatus>,

    #[serde(default)]
    pub vms: Vec<ResourceStatus>,
}
