//! Reconciler worker: drains a range's observation queue into its engine

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::reconcile::{ApplyResult, Engine, Observation};

/// Apply observations in arrival order until the queue closes or the
/// range is discarded
pub async fn run(mut engine: Engine, mut observations: mpsc::UnboundedReceiver<Observation>) {
    let range_id = engine.range_id().to_string();
    info!(range_id = %range_id, "Reconciler worker starting...");

    while let Some(observation) = observations.recv().await {
        let kind = observation.kind();
        match engine.apply(observation) {
            ApplyResult::Applied { revision } => debug!(range_id = %range_id, kind, revision, "Applied observation"),
            ApplyResult::Unchanged => debug!(range_id = %range_id, kind, "Observation changed nothing"),
            ApplyResult::Discarded => break,
        }
    }

    info!(range_id = %range_id, "Reconciler worker shutting down...");
}
