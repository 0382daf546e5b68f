//! Domain models

pub mod state;

pub use range_api::{
    DeploymentSnapshot, DeploymentSummary, EventType, RangeStatus, RealtimeEvent, ResourceState,
    ResourceStatus,
};
pub use state::{
    ConnectionState, FeedHealth, ObservationSource, PollHealth, RangeState, RangeView,
    ResourceKey, StoreEntry,
};
