//! Pure merge of one observation into a range state
//!
//! Invariants:
//! - Within one deployment attempt a resource's status never moves to a
//!   lower rank, whichever feed the stale observation comes from.
//! - Re-applying an observation changes nothing.
//! - Snapshots never open a new attempt.

use chrono::{DateTime, Utc};
use range_api::{DeploymentSnapshot, RangeStatus, RealtimeEvent, ResourceState, ResourceStatus};

use crate::models::{ConnectionState, ObservationSource, PollHealth, RangeState, ResourceKey, StoreEntry};
use crate::reconcile::aggregate::derive_range_status;
use crate::reconcile::transitions::{self, Effect};

/// Something the engine was told about a range
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Full snapshot from the status poller
    Snapshot(DeploymentSnapshot),
    /// Incremental event from the push channel
    Event(RealtimeEvent),
    /// Client-side guess shown until the next real observation
    Optimistic(RangeStatus),
    PollHealth(PollHealth),
    Connection(ConnectionState),
}

impl Observation {
    pub fn kind(&self) -> &'static str {
        match self {
            Observation::Snapshot(_) => "snapshot",
            Observation::Event(_) => "event",
            Observation::Optimistic(_) => "optimistic",
            Observation::PollHealth(_) => "poll_health",
            Observation::Connection(_) => "connection",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// The observation was behind the current status and was not applied
    StaleObservation,
    /// The observation skipped the state machine and was applied anyway
    InvalidTransition,
}

/// A disagreement between the current state and an observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub resource: ResourceKey,
    pub kind: ConflictKind,
    pub current: ResourceState,
    pub current_source: ObservationSource,
    pub observed: ResourceState,
    pub observed_source: ObservationSource,
}

/// Result of a merge
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub state: RangeState,
    pub conflicts: Vec<Conflict>,
    /// Parts of the observation that were skipped, for logging
    pub ignored: Vec<String>,
    pub changed: bool,
}

/// Merge `observation` into `current`, returning the new state
pub fn merge(
    current: &RangeState,
    observation: &Observation,
    observed_at: DateTime<Utc>,
) -> MergeOutcome {
    let mut merger = Merger {
        state: current.clone(),
        observed_at,
        conflicts: Vec::new(),
        ignored: Vec::new(),
    };

    match observation {
        Observation::Snapshot(snapshot) => merger.apply_snapshot(snapshot),
        Observation::Event(event) => merger.apply_event(event),
        Observation::Optimistic(status) => merger.state.optimistic = Some(*status),
        Observation::PollHealth(health) => merger.state.health.poll = *health,
        Observation::Connection(connection) => merger.state.health.connection = *connection,
    }

    let mut state = merger.state;
    state.status = derive_range_status(&state);
    let changed = state != *current;

    MergeOutcome {
        state,
        conflicts: merger.conflicts,
        ignored: merger.ignored,
        changed,
    }
}

struct Merger {
    state: RangeState,
    observed_at: DateTime<Utc>,
    conflicts: Vec<Conflict>,
    ignored: Vec<String>,
}

impl Merger {
    fn apply_snapshot(&mut self, snapshot: &DeploymentSnapshot) {
        self.state.optimistic = None;
        self.state.reported_status = Some(snapshot.status);
        self.state.elapsed_seconds = self.state.elapsed_seconds.max(snapshot.elapsed_seconds);

        if let Some(router) = &snapshot.router {
            self.merge_resource(ResourceKey::Router, router.clone(), ObservationSource::Poll);
        }
        for network in &snapshot.networks {
            match non_empty_id(network) {
                Some(id) => self.merge_resource(
                    ResourceKey::Network(id),
                    network.clone(),
                    ObservationSource::Poll,
                ),
                None => self
                    .ignored
                    .push(format!("network '{}' without id", network.name)),
            }
        }
        for vm in &snapshot.vms {
            match non_empty_id(vm) {
                Some(id) => {
                    self.merge_resource(ResourceKey::Vm(id), vm.clone(), ObservationSource::Poll)
                }
                None => self.ignored.push(format!("vm '{}' without id", vm.name)),
            }
        }
    }

    fn apply_event(&mut self, event: &RealtimeEvent) {
        if event.range_id != self.state.range_id {
            self.ignored
                .push(format!("event for other range {}", event.range_id));
            return;
        }
        let Some(rule) = transitions::rule_for(event.event_type) else {
            return;
        };

        self.state.optimistic = None;

        match rule.effect {
            Effect::NewAttempt => {
                // A start no newer than the one that opened this attempt is a redelivery
                if self
                    .state
                    .attempt_started_at
                    .is_some_and(|opened| event.timestamp <= opened)
                {
                    self.ignored
                        .push(format!("repeated deployment_started at {}", event.timestamp));
                    return;
                }
                if self.state.status == RangeStatus::Deploying {
                    self.state.attempt_started_at = Some(event.timestamp);
                    return;
                }
                let observed_at = self.observed_at;
                let state = &mut self.state;
                state.attempt += 1;
                state.attempt_started_at = Some(event.timestamp);
                state.status = RangeStatus::Deploying;
                state.reported_status = Some(RangeStatus::Deploying);
                state.status_detail = None;
                state.range_failed = false;
                state.elapsed_seconds = 0;

                // Resources are deployed again from scratch
                let attempt = state.attempt;
                let entries = state
                    .router
                    .iter_mut()
                    .chain(state.networks.iter_mut())
                    .chain(state.vms.iter_mut());
                for entry in entries {
                    entry.resource.status = ResourceState::Pending;
                    entry.resource.status_detail = None;
                    entry.resource.duration_ms = None;
                    entry.attempt = attempt;
                    entry.last_source = ObservationSource::Event;
                    entry.last_observed_at = observed_at;
                }
            }
            Effect::RangeFailed => {
                self.state.range_failed = true;
                self.state.status_detail = non_empty(&event.message)
                    .or_else(|| event.data_str("status_detail").map(str::to_string));
            }
            Effect::RangeReported(status) => self.state.reported_status = Some(status),
            Effect::Resource(status) => match transitions::target_key(rule.target, event) {
                Some(key) => {
                    let incoming = resource_from_event(&key, status, event);
                    self.merge_resource(key, incoming, ObservationSource::Event);
                }
                None => self
                    .ignored
                    .push(format!("{:?} event without target id", event.event_type)),
            },
        }
    }

    fn merge_resource(
        &mut self,
        key: ResourceKey,
        mut incoming: ResourceStatus,
        source: ObservationSource,
    ) {
        let attempt = self.state.attempt;

        let Some(current) = self.state.entry(&key) else {
            if incoming.name.is_empty() {
                incoming.name = default_name(&key);
            }
            let entry = self.entry(incoming, source);
            self.state.put_entry(&key, entry);
            return;
        };

        let same_attempt = current.attempt == attempt;
        let current_status = current.status();

        if same_attempt {
            if incoming.status.rank() < current_status.rank() {
                self.conflicts.push(Conflict {
                    resource: key,
                    kind: ConflictKind::StaleObservation,
                    current: current_status,
                    current_source: current.last_source,
                    observed: incoming.status,
                    observed_source: source,
                });
                return;
            }
            if source == ObservationSource::Event && incoming.status == current_status {
                return;
            }
            if !current_status.can_transition_to(incoming.status) {
                self.conflicts.push(Conflict {
                    resource: key.clone(),
                    kind: ConflictKind::InvalidTransition,
                    current: current_status,
                    current_source: current.last_source,
                    observed: incoming.status,
                    observed_source: source,
                });
            }
        }

        if !current.resource.name.is_empty() {
            incoming.name = current.resource.name.clone();
        } else if incoming.name.is_empty() {
            incoming.name = default_name(&key);
        }
        if incoming.id.is_none() {
            incoming.id = current.resource.id.clone();
        }
        if same_attempt && incoming.status == current_status && !current_status.is_terminal() {
            incoming.duration_ms = match (current.resource.duration_ms, incoming.duration_ms) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => b.or(a),
            };
        }

        if same_attempt && incoming == current.resource {
            return;
        }

        let entry = self.entry(incoming, source);
        self.state.put_entry(&key, entry);
    }

    fn entry(&self, resource: ResourceStatus, source: ObservationSource) -> StoreEntry {
        StoreEntry {
            resource,
            last_observed_at: self.observed_at,
            last_source: source,
            attempt: self.state.attempt,
        }
    }
}

fn resource_from_event(
    key: &ResourceKey,
    status: ResourceState,
    event: &RealtimeEvent,
) -> ResourceStatus {
    let id = match key {
        ResourceKey::Router => None,
        ResourceKey::Network(id) | ResourceKey::Vm(id) => Some(id.clone()),
    };
    let status_detail = event
        .data_str("status_detail")
        .map(str::to_string)
        .or_else(|| {
            if status.is_failed() {
                non_empty(&event.message)
            } else {
                None
            }
        });

    ResourceStatus {
        id,
        name: event.data_str("name").unwrap_or_default().to_string(),
        status,
        status_detail,
        duration_ms: event.data_u64("duration_ms"),
    }
}

fn default_name(key: &ResourceKey) -> String {
    match key {
        ResourceKey::Router => "router".to_string(),
        ResourceKey::Network(id) | ResourceKey::Vm(id) => id.clone(),
    }
}

fn non_empty_id(resource: &ResourceStatus) -> Option<String> {
    resource.id.as_ref().filter(|id| !id.is_empty()).cloned()
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}
