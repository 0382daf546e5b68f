//! Reconciliation of poll snapshots and push events

pub mod aggregate;
pub mod engine;
pub mod merge;
pub mod transitions;

pub use engine::{ApplyResult, DeploymentListener, Engine, LoggingListener};
pub use merge::{merge, Conflict, ConflictKind, MergeOutcome, Observation};
