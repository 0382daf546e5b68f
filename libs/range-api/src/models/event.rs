//! Realtime deployment events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a realtime event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Deployment lifecycle
    DeploymentStarted,
    DeploymentStep,
    DeploymentCompleted,
    DeploymentFailed,
    RangeStopped,

    // Router
    RouterCreating,
    RouterCreated,
    RouterFailed,

    // Networks
    NetworkCreating,
    NetworkCreated,
    NetworkFailed,

    // VMs
    VmCreating,
    VmStarted,
    VmStopped,
    #[serde(alias = "vm_error")]
    VmFailed,

    /// Any kind this client does not know about
    #[serde(other)]
    Unknown,
}

/// A single pushed notification about one change in a range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub event_type: EventType,

    pub range_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub data: serde_json::Value,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl RealtimeEvent {
    pub fn new(event_type: EventType, range_id: impl Into<String>) -> Self {
        Self {
            event_type,
            range_id: range_id.into(),
            vm_id: None,
            network_id: None,
            message: String::new(),
            data: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    pub fn with_vm(mut self, vm_id: impl Into<String>) -> Self {
        self.vm_id = Some(vm_id.into());
        self
    }

    pub fn with_network(mut self, network_id: impl Into<String>) -> Self {
        self.network_id = Some(network_id.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// String field of the free-form payload
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Unsigned integer field of the free-form payload
    pub fn data_u64(&self, key: &str) -> Option<u64> {
        self.data.get(key).and_then(|v| v.as_u64())
    }
}
