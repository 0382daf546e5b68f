//! Range Watcher Library
//!
//! Keeps a client-side view of range deployments in sync with the backend
//! by reconciling polled snapshots with pushed events.

pub mod app;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod notify;
pub mod realtime;
pub mod reconcile;
pub mod server;
pub mod storage;
pub mod store;
pub mod utils;
pub mod watch;
pub mod workers;
