//! API models

pub mod event;
pub mod protocol;
pub mod snapshot;
pub mod status;
