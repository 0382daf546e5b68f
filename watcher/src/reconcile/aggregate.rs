//! Range-level status derivation

use range_api::{RangeStatus, ResourceState};

use crate::models::RangeState;

/// Derive the range status from the reconciled resources.
///
/// `state.status` is the previously derived status. Settled statuses hold for
/// the rest of the attempt, except that a running range the server reports
/// stopped becomes stopped.
pub fn derive_range_status(state: &RangeState) -> RangeStatus {
    let reported = state.reported_status;

    match state.status {
        RangeStatus::Running if reported == Some(RangeStatus::Stopped) => {
            return RangeStatus::Stopped
        }
        RangeStatus::Running | RangeStatus::Error | RangeStatus::Stopped => return state.status,
        RangeStatus::Draft | RangeStatus::Deploying => {}
    }

    if state.range_failed {
        return RangeStatus::Error;
    }

    if !state.has_resources() {
        return reported.unwrap_or(state.status);
    }

    let statuses: Vec<ResourceState> = state.entries().map(|(_, e)| e.status()).collect();

    if statuses.iter().all(|s| s.is_success()) {
        return RangeStatus::Running;
    }
    if statuses.iter().any(|s| s.is_failed()) || reported == Some(RangeStatus::Error) {
        return RangeStatus::Error;
    }
    if reported == Some(RangeStatus::Stopped) && statuses.iter().all(|s| s.is_terminal()) {
        return RangeStatus::Stopped;
    }
    // Resources listed for a range nobody has deployed yet
    if state.status == RangeStatus::Draft
        && reported == Some(RangeStatus::Draft)
        && statuses.iter().all(|s| *s == ResourceState::Pending)
    {
        return RangeStatus::Draft;
    }

    RangeStatus::Deploying
}
