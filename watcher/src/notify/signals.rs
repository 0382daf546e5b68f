//! Ephemeral UI signals

use std::fmt;

use range_api::ResourceState;
use serde::Serialize;
use tokio::time::Instant;

use crate::models::ResourceKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Success,
    Error,
}

impl fmt::Display for ToastLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToastLevel::Success => f.write_str("success"),
            ToastLevel::Error => f.write_str("error"),
        }
    }
}

/// A transient signal for render layers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Highlight a resource whose status just changed
    Pulse {
        id: u64,
        range_id: String,
        resource: ResourceKey,
        status: ResourceState,
        expires_at: Instant,
    },
    /// The pulse with this id is over
    PulseExpired {
        id: u64,
        range_id: String,
        resource: ResourceKey,
    },
    /// Short user-facing message. `resource` is `None` for range-level toasts.
    Toast {
        range_id: String,
        level: ToastLevel,
        resource: Option<ResourceKey>,
        message: String,
    },
}

impl Signal {
    pub fn range_id(&self) -> &str {
        match self {
            Signal::Pulse { range_id, .. }
            | Signal::PulseExpired { range_id, .. }
            | Signal::Toast { range_id, .. } => range_id,
        }
    }
}
