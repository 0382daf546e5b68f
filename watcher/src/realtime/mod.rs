//! Push channel to the backend event endpoint

pub mod channel;
pub mod client;

pub use channel::EventChannel;
pub use client::{build_ws_url, WsClient};
