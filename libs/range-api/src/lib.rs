//! Range API
//!
//! Wire schemas shared with the range backend: the deployment status
//! vocabulary, status snapshots, realtime events and push-channel envelopes.

pub mod models;

pub use models::event::{EventType, RealtimeEvent};
pub use models::protocol::{ClientMessage, ServerMessage};
pub use models::snapshot::{DeploymentSnapshot, DeploymentSummary, ResourceStatus};
pub use models::status::{RangeStatus, ResourceState};
