//! Per-range reconciliation engine

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use range_api::{RangeStatus, ResourceState};
use tracing::{debug, info, warn};

use crate::models::RangeState;
use crate::reconcile::merge::{merge, ConflictKind, Observation};
use crate::store::ResourceStore;

/// Callbacks fired on derived deployment transitions.
///
/// Every method has an empty default so listeners implement only what they
/// need. Callbacks run on the engine task and must not block.
pub trait DeploymentListener: Send + Sync {
    /// The range entered `running`. Fires once per attempt.
    fn on_deployment_complete(&self, _range_id: &str) {}

    /// The range entered `error`. Fires once per attempt.
    fn on_deployment_failed(&self, _range_id: &str, _detail: Option<&str>) {}

    /// The range status or a VM status changed
    fn on_status_change(
        &self,
        _range_id: &str,
        _status: RangeStatus,
        _vms: &BTreeMap<String, ResourceState>,
    ) {
    }
}

/// Listener that only logs
pub struct LoggingListener;

impl DeploymentListener for LoggingListener {
    fn on_deployment_complete(&self, range_id: &str) {
        info!(range_id, "Deployment complete");
    }

    fn on_deployment_failed(&self, range_id: &str, detail: Option<&str>) {
        warn!(range_id, detail = detail.unwrap_or("-"), "Deployment failed");
    }

    fn on_status_change(
        &self,
        range_id: &str,
        status: RangeStatus,
        vms: &BTreeMap<String, ResourceState>,
    ) {
        debug!(range_id, %status, vms = vms.len(), "Status changed");
    }
}

/// What happened to an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyResult {
    /// The state changed and was published at this revision
    Applied { revision: u64 },
    /// Nothing visible changed
    Unchanged,
    /// The range is no longer watched
    Discarded,
}

/// Sole writer of one range's state in the store.
///
/// Observations are applied strictly one at a time in arrival order.
pub struct Engine {
    state: RangeState,
    store: Arc<ResourceStore>,
    listener: Arc<dyn DeploymentListener>,
    alive: Arc<AtomicBool>,
}

impl Engine {
    pub fn new(
        range_id: &str,
        store: Arc<ResourceStore>,
        listener: Arc<dyn DeploymentListener>,
        alive: Arc<AtomicBool>,
    ) -> Self {
        let state = store
            .state(range_id)
            .map(|s| s.as_ref().clone())
            .unwrap_or_else(|| RangeState::new(range_id));
        Self {
            state,
            store,
            listener,
            alive,
        }
    }

    pub fn range_id(&self) -> &str {
        &self.state.range_id
    }

    pub fn state(&self) -> &RangeState {
        &self.state
    }

    /// Apply an observation received now
    pub fn apply(&mut self, observation: Observation) -> ApplyResult {
        self.apply_at(observation, Utc::now())
    }

    /// Apply an observation received at `observed_at`
    pub fn apply_at(&mut self, observation: Observation, observed_at: DateTime<Utc>) -> ApplyResult {
        if !self.alive.load(Ordering::SeqCst) {
            debug!(
                range_id = %self.state.range_id,
                kind = observation.kind(),
                "Dropping observation for unwatched range"
            );
            return ApplyResult::Discarded;
        }

        let outcome = merge(&self.state, &observation, observed_at);

        for conflict in &outcome.conflicts {
            let reason = match conflict.kind {
                ConflictKind::StaleObservation => "stale observation skipped",
                ConflictKind::InvalidTransition => "transition outside the state machine applied",
            };
            warn!(
                range_id = %self.state.range_id,
                resource = %conflict.resource,
                current = %conflict.current,
                current_source = ?conflict.current_source,
                observed = %conflict.observed,
                observed_source = ?conflict.observed_source,
                "Conflict: {}",
                reason
            );
        }
        for ignored in &outcome.ignored {
            debug!(range_id = %self.state.range_id, "Ignored: {}", ignored);
        }

        if !outcome.changed {
            return ApplyResult::Unchanged;
        }

        let mut next = outcome.state;
        next.revision = self.state.revision + 1;
        let previous = std::mem::replace(&mut self.state, next);

        if !self.store.publish(self.state.clone()) {
            self.alive.store(false, Ordering::SeqCst);
            debug!(range_id = %self.state.range_id, "Range closed, engine going idle");
            return ApplyResult::Discarded;
        }

        self.fire_callbacks(&previous);

        ApplyResult::Applied {
            revision: self.state.revision,
        }
    }

    fn fire_callbacks(&self, previous: &RangeState) {
        let range_id = self.state.range_id.as_str();
        let (before, after) = (previous.status, self.state.status);

        if before != after {
            info!(range_id, from = %before, to = %after, attempt = self.state.attempt, "Range status changed");
        }

        // The first population reports where the range already is, not a transition
        if before != after && !previous.is_unpopulated() {
            match after {
                RangeStatus::Running => self.listener.on_deployment_complete(range_id),
                RangeStatus::Error => self
                    .listener
                    .on_deployment_failed(range_id, self.state.status_detail.as_deref()),
                _ => {}
            }
        }

        let vms = self.state.vm_statuses();
        if before != after || vms != previous.vm_statuses() {
            self.listener.on_status_change(range_id, after, &vms);
        }
    }
}
