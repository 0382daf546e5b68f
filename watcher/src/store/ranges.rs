//! In-memory store of reconciled range states

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use range_api::{DeploymentSnapshot, RangeStatus};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::models::{RangeState, RangeView};

/// Store subscriber, called with every published state
pub type Callback = Arc<dyn Fn(&Arc<RangeState>) + Send + Sync>;

struct RangeSlot {
    state: Arc<RangeState>,
    tx: watch::Sender<Arc<RangeState>>,
    subscribers: Vec<(Uuid, Callback)>,
}

/// Canonical client-side state of every watched range.
///
/// Readers use `get`, `state`, `subscribe` and `watch`. Only the
/// reconciliation engine publishes.
pub struct ResourceStore {
    ranges: RwLock<HashMap<String, RangeSlot>>,
}

impl ResourceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            ranges: RwLock::new(HashMap::new()),
        }
    }

    /// Open a slot for a range. Returns `false` if it was already open.
    pub fn open(&self, range_id: &str) -> bool {
        let mut ranges = self.ranges.write().unwrap_or_else(|e| e.into_inner());
        if ranges.contains_key(range_id) {
            return false;
        }
        let state = Arc::new(RangeState::new(range_id));
        let (tx, _rx) = watch::channel(state.clone());
        ranges.insert(
            range_id.to_string(),
            RangeSlot {
                state,
                tx,
                subscribers: Vec::new(),
            },
        );
        true
    }

    pub fn is_open(&self, range_id: &str) -> bool {
        let ranges = self.ranges.read().unwrap_or_else(|e| e.into_inner());
        ranges.contains_key(range_id)
    }

    /// Current `DeploymentSnapshot`-shaped view of a range
    pub fn get(&self, range_id: &str) -> Option<DeploymentSnapshot> {
        self.state(range_id).map(|state| state.to_snapshot())
    }

    /// Full reconciled state of a range
    pub fn state(&self, range_id: &str) -> Option<Arc<RangeState>> {
        let ranges = self.ranges.read().unwrap_or_else(|e| e.into_inner());
        ranges.get(range_id).map(|slot| slot.state.clone())
    }

    /// Serializable view of a range
    pub fn view(&self, range_id: &str) -> Option<RangeView> {
        self.state(range_id).map(|state| RangeView::from(state.as_ref()))
    }

    /// Reconciled range status, without the optimistic overlay
    pub fn status(&self, range_id: &str) -> Option<RangeStatus> {
        self.state(range_id).map(|state| state.status)
    }

    /// Ids of every open range
    pub fn range_ids(&self) -> Vec<String> {
        let ranges = self.ranges.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = ranges.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Subscribe to every update of a range.
    ///
    /// The callback is invoked right away with the current state, then once
    /// per published state. Returns `None` if the range is not open.
    pub fn subscribe<F>(&self, range_id: &str, callback: F) -> Option<Uuid>
    where
        F: Fn(&Arc<RangeState>) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        let callback: Callback = Arc::new(callback);

        let current = {
            let mut ranges = self.ranges.write().unwrap_or_else(|e| e.into_inner());
            let slot = ranges.get_mut(range_id)?;
            slot.subscribers.push((id, callback.clone()));
            slot.state.clone()
        };

        callback(&current);
        Some(id)
    }

    /// Remove a subscription. Returns `false` if it did not exist.
    pub fn unsubscribe(&self, range_id: &str, subscription: Uuid) -> bool {
        let mut ranges = self.ranges.write().unwrap_or_else(|e| e.into_inner());
        let Some(slot) = ranges.get_mut(range_id) else {
            return false;
        };
        let before = slot.subscribers.len();
        slot.subscribers.retain(|(id, _)| *id != subscription);
        slot.subscribers.len() != before
    }

    /// Watch the latest state of a range from async code
    pub fn watch(&self, range_id: &str) -> Option<watch::Receiver<Arc<RangeState>>> {
        let ranges = self.ranges.read().unwrap_or_else(|e| e.into_inner());
        ranges.get(range_id).map(|slot| slot.tx.subscribe())
    }

    /// Discard a range and all its subscriptions
    pub fn clear(&self, range_id: &str) -> bool {
        let mut ranges = self.ranges.write().unwrap_or_else(|e| e.into_inner());
        let removed = ranges.remove(range_id).is_some();
        if removed {
            debug!(range_id, "Cleared range state");
        }
        removed
    }

    /// Replace the state of an open range and notify subscribers.
    ///
    /// Returns `false` and drops the state if the range is not open.
    pub(crate) fn publish(&self, state: RangeState) -> bool {
        let state = Arc::new(state);

        let subscribers: Vec<Callback> = {
            let mut ranges = self.ranges.write().unwrap_or_else(|e| e.into_inner());
            let Some(slot) = ranges.get_mut(&state.range_id) else {
                return false;
            };
            slot.state = state.clone();
            slot.tx.send_replace(state.clone());
            slot.subscribers.iter().map(|(_, cb)| cb.clone()).collect()
        };

        for callback in subscribers {
            callback(&state);
        }
        true
    }
}

impl Default for ResourceStore {
    fn default() -> Self {
        Self::new()
    }
}
