//! Registry of watched ranges

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use range_api::RangeStatus;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::errors::WatchError;
use crate::notify::Signal;
use crate::store::ResourceStore;
use crate::watch::session::{RangeSession, WatchContext};

/// Entry point for render layers: watch ranges, read the store, listen to
/// signals
pub struct Watcher {
    ctx: WatchContext,
    sessions: Mutex<HashMap<String, RangeSession>>,
}

impl Watcher {
    pub fn new(ctx: WatchContext) -> Self {
        Self {
            ctx,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Start watching a range. Returns `false` if it is already watched.
    pub fn watch(&self, range_id: &str) -> bool {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if sessions.contains_key(range_id) {
            debug!(range_id, "Range already watched");
            return false;
        }
        sessions.insert(range_id.to_string(), RangeSession::start(range_id, &self.ctx));
        true
    }

    /// Stop watching a range and discard its state. Returns `false` if it
    /// was not watched.
    pub fn unwatch(&self, range_id: &str) -> bool {
        let removed = {
            let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            sessions.remove(range_id)
        };
        match removed {
            Some(mut session) => {
                session.teardown();
                true
            }
            None => false,
        }
    }

    /// Show `status` for a watched range until the next real observation
    pub fn optimistic(&self, range_id: &str, status: RangeStatus) -> Result<(), WatchError> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        match sessions.get(range_id) {
            Some(session) => session.optimistic(status),
            None => Err(WatchError::NotFound(format!("range {} is not watched", range_id))),
        }
    }

    /// Force one status fetch for a watched range
    pub fn refresh(&self, range_id: &str) -> Result<(), WatchError> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        match sessions.get(range_id) {
            Some(session) => {
                session.refresh();
                Ok(())
            }
            None => Err(WatchError::NotFound(format!("range {} is not watched", range_id))),
        }
    }

    pub fn is_watched(&self, range_id: &str) -> bool {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.contains_key(range_id)
    }

    /// Watched range ids, sorted
    pub fn watched(&self) -> Vec<String> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn store(&self) -> &Arc<ResourceStore> {
        &self.ctx.store
    }

    /// Receive pulse and toast signals of every watched range
    pub fn signals(&self) -> broadcast::Receiver<Signal> {
        self.ctx.signals.subscribe()
    }

    /// Tear down every session
    pub fn shutdown(&self) {
        let drained: Vec<RangeSession> = {
            let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            sessions.drain().map(|(_, session)| session).collect()
        };
        info!(sessions = drained.len(), "Stopping watch sessions");
        for mut session in drained {
            session.teardown();
        }
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
