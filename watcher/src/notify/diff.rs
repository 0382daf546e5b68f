//! Diff of two consecutive range states

use std::collections::HashSet;

use range_api::{RangeStatus, ResourceState};
use thiserror::Error;

use crate::models::{RangeState, ResourceKey, StoreEntry};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("range {range_id}: {kind} entry without an id")]
    MissingId { range_id: String, kind: &'static str },

    #[error("range {range_id}: duplicate {kind} id {id}")]
    DuplicateId {
        range_id: String,
        kind: &'static str,
        id: String,
    },
}

/// One resource whose status changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceChange {
    pub resource: ResourceKey,
    pub name: String,
    pub status_detail: Option<String>,
    /// `None` when the resource is new
    pub from: Option<ResourceState>,
    pub to: ResourceState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDiff {
    pub range_from: RangeStatus,
    pub range_to: RangeStatus,
    pub new_attempt: bool,
    pub changes: Vec<ResourceChange>,
}

impl StateDiff {
    pub fn range_changed(&self) -> bool {
        self.range_from != self.range_to
    }
}

/// Compute the status changes between `prev` and `next`.
///
/// Fails when either state holds a network or VM without an id, or two
/// entries of one kind sharing an id.
pub fn diff(prev: &RangeState, next: &RangeState) -> Result<StateDiff, NotifyError> {
    validate(prev)?;
    validate(next)?;

    let changes = next
        .entries()
        .filter_map(|(key, entry)| {
            let from = prev.entry(&key).map(StoreEntry::status);
            if from == Some(entry.status()) {
                return None;
            }
            Some(ResourceChange {
                name: entry.resource.name.clone(),
                status_detail: entry.resource.status_detail.clone(),
                resource: key,
                from,
                to: entry.status(),
            })
        })
        .collect();

    Ok(StateDiff {
        range_from: prev.status,
        range_to: next.status,
        new_attempt: next.attempt != prev.attempt,
        changes,
    })
}

fn validate(state: &RangeState) -> Result<(), NotifyError> {
    check_ids(&state.range_id, "network", &state.networks)?;
    check_ids(&state.range_id, "vm", &state.vms)
}

fn check_ids(range_id: &str, kind: &'static str, entries: &[StoreEntry]) -> Result<(), NotifyError> {
    let mut seen = HashSet::new();
    for entry in entries {
        let id = match entry.resource.id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => {
                return Err(NotifyError::MissingId {
                    range_id: range_id.to_string(),
                    kind,
                })
            }
        };
        if !seen.insert(id) {
            return Err(NotifyError::DuplicateId {
                range_id: range_id.to_string(),
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}
