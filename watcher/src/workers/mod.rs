//! Background workers

pub mod channel;
pub mod console;
pub mod notifier;
pub mod poller;
pub mod reconciler;
