//! Transition notifications derived from consecutive store states

pub mod diff;
pub mod notifier;
pub mod signals;

pub use diff::{diff, NotifyError, ResourceChange, StateDiff};
pub use notifier::Notifier;
pub use signals::{Signal, ToastLevel};
