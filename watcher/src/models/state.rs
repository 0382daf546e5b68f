//! Reconciled range state

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use range_api::{
    DeploymentSnapshot, DeploymentSummary, RangeStatus, ResourceState, ResourceStatus,
};
use serde::{Deserialize, Serialize};

/// Identity of a resource within a range
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ResourceKey {
    /// The range's single router
    Router,
    Network(String),
    Vm(String),
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::Router => f.write_str("router"),
            ResourceKey::Network(id) => write!(f, "network/{}", id),
            ResourceKey::Vm(id) => write!(f, "vm/{}", id),
        }
    }
}

/// Where an observation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationSource {
    Poll,
    Event,
}

/// A reconciled resource status plus the bookkeeping used for conflicts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEntry {
    pub resource: ResourceStatus,
    pub last_observed_at: DateTime<Utc>,
    pub last_source: ObservationSource,
    /// Deployment attempt this entry was last written in
    pub attempt: u32,
}

impl StoreEntry {
    pub fn status(&self) -> ResourceState {
        self.resource.status
    }
}

/// State of the push connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Connected,
    #[default]
    Disconnected,
    Error,
}

/// Health of the status poller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PollHealth {
    #[default]
    Healthy,
    /// Recent polls failed but the threshold is not reached yet
    Failing { consecutive: u32 },
    /// The displayed state may be stale
    StatusUnknown { consecutive: u32 },
}

/// Side-channel health of the two feeds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedHealth {
    pub connection: ConnectionState,
    pub poll: PollHealth,
}

impl FeedHealth {
    /// The displayed status cannot be trusted as fresh
    pub fn is_status_unknown(&self) -> bool {
        matches!(self.poll, PollHealth::StatusUnknown { .. })
    }
}

/// Everything currently believed true about one range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeState {
    pub range_id: String,

    /// Reconciled range status
    pub status: RangeStatus,

    /// Range-level explanation, e.g. the deployment failure cause
    pub status_detail: Option<String>,

    /// Last status the server reported for the range itself
    pub reported_status: Option<RangeStatus>,

    /// The server declared the current attempt failed
    pub range_failed: bool,

    pub elapsed_seconds: u64,

    pub router: Option<StoreEntry>,
    pub networks: Vec<StoreEntry>,
    pub vms: Vec<StoreEntry>,

    pub attempt: u32,

    /// Timestamp of the `deployment_started` event that opened `attempt`
    pub attempt_started_at: Option<DateTime<Utc>>,

    /// Client-side guess shown until the first real observation
    pub optimistic: Option<RangeStatus>,

    pub health: FeedHealth,

    /// Bumped on every published change
    pub revision: u64,
}

impl RangeState {
    pub fn new(range_id: impl Into<String>) -> Self {
        Self {
            range_id: range_id.into(),
            status: RangeStatus::Draft,
            status_detail: None,
            reported_status: None,
            range_failed: false,
            elapsed_seconds: 0,
            router: None,
            networks: Vec::new(),
            vms: Vec::new(),
            attempt: 0,
            attempt_started_at: None,
            optimistic: None,
            health: FeedHealth::default(),
            revision: 0,
        }
    }

    /// Status to display, including the optimistic overlay
    pub fn visible_status(&self) -> RangeStatus {
        self.optimistic.unwrap_or(self.status)
    }

    pub fn entry(&self, key: &ResourceKey) -> Option<&StoreEntry> {
        match key {
            ResourceKey::Router => self.router.as_ref(),
            ResourceKey::Network(id) => find_entry(&self.networks, id),
            ResourceKey::Vm(id) => find_entry(&self.vms, id),
        }
    }

    /// Insert or replace the entry for `key`, keeping first-appearance order
    pub fn put_entry(&mut self, key: &ResourceKey, entry: StoreEntry) {
        let list = match key {
            ResourceKey::Router => {
                self.router = Some(entry);
                return;
            }
            ResourceKey::Network(_) => &mut self.networks,
            ResourceKey::Vm(_) => &mut self.vms,
        };
        let id = entry.resource.id.clone();
        match list.iter_mut().find(|e| e.resource.id == id) {
            Some(slot) => *slot = entry,
            None => list.push(entry),
        }
    }

    /// All entries with their keys: router first, then networks, then VMs
    pub fn entries(&self) -> impl Iterator<Item = (ResourceKey, &StoreEntry)> + '_ {
        let router = self.router.iter().map(|e| (ResourceKey::Router, e));
        let networks = self
            .networks
            .iter()
            .map(|e| (ResourceKey::Network(entry_id(e)), e));
        let vms = self.vms.iter().map(|e| (ResourceKey::Vm(entry_id(e)), e));
        router.chain(networks).chain(vms)
    }

    pub fn has_resources(&self) -> bool {
        self.router.is_some() || !self.networks.is_empty() || !self.vms.is_empty()
    }

    /// Nothing has been observed for the range yet
    pub fn is_unpopulated(&self) -> bool {
        self.reported_status.is_none() && !self.has_resources() && self.attempt == 0
    }

    /// Status of every VM keyed by id
    pub fn vm_statuses(&self) -> BTreeMap<String, ResourceState> {
        self.vms
            .iter()
            .map(|e| (entry_id(e), e.status()))
            .collect()
    }

    pub fn summary(&self) -> DeploymentSummary {
        DeploymentSummary::from_states(self.entries().map(|(_, e)| e.status()))
    }

    /// `DeploymentSnapshot`-shaped view of the reconciled state
    pub fn to_snapshot(&self) -> DeploymentSnapshot {
        DeploymentSnapshot {
            status: self.visible_status(),
            elapsed_seconds: self.elapsed_seconds,
            summary: self.summary(),
            router: self.router.as_ref().map(|e| e.resource.clone()),
            networks: self.networks.iter().map(|e| e.resource.clone()).collect(),
            vms: self.vms.iter().map(|e| e.resource.clone()).collect(),
        }
    }
}

fn find_entry<'a>(list: &'a [StoreEntry], id: &str) -> Option<&'a StoreEntry> {
    list.iter().find(|e| e.resource.id.as_deref() == Some(id))
}

fn entry_id(entry: &StoreEntry) -> String {
    entry.resource.id.clone().unwrap_or_default()
}

/// Serializable view handed to render layers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeView {
    pub range_id: String,
    #[serde(flatten)]
    pub snapshot: DeploymentSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_detail: Option<String>,
    pub health: FeedHealth,
    pub optimistic: bool,
    pub attempt: u32,
    pub revision: u64,
}

impl From<&RangeState> for RangeView {
    fn from(state: &RangeState) -> Self {
        Self {
            range_id: state.range_id.clone(),
            snapshot: state.to_snapshot(),
            status_detail: state.status_detail.clone(),
            health: state.health,
            optimistic: state.optimistic.is_some(),
            attempt: state.attempt,
            revision: state.revision,
        }
    }
}
