//! Per-range watch sessions

pub mod registry;
pub mod session;

pub use registry::Watcher;
pub use session::{RangeSession, WatchContext};
