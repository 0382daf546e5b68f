//! Server state

use std::sync::Arc;

use crate::watch::Watcher;

/// Server state shared across handlers
pub struct ServerState {
    pub watcher: Arc<Watcher>,
}

impl ServerState {
    pub fn new(watcher: Arc<Watcher>) -> Self {
        Self { watcher }
    }
}
