//! Status poller worker

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::errors::WatchError;
use crate::http::deployments::StatusSource;
use crate::models::{PollHealth, RangeState};
use crate::reconcile::Observation;
use crate::utils::CooldownOptions;

/// Poller worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Delay between polls while the range is unsettled
    pub interval: Duration,

    /// Bound on a single status request
    pub request_timeout: Duration,

    /// Consecutive failures before the status is reported unknown
    pub failure_threshold: u32,

    /// Backoff applied after failures
    pub backoff: CooldownOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(10),
            failure_threshold: 3,
            backoff: CooldownOptions::default(),
        }
    }
}

/// Run the poller worker for one range.
///
/// Fetches on `options.interval` while the reconciled status in `state_rx` is
/// unsettled and parks otherwise. Every message on `trigger_rx` causes one
/// immediate fetch, settled or not.
#[allow(clippy::too_many_arguments)]
pub async fn run<S, F>(
    options: &Options,
    source: &dyn StatusSource,
    range_id: &str,
    mut state_rx: watch::Receiver<Arc<RangeState>>,
    sink: mpsc::UnboundedSender<Observation>,
    mut trigger_rx: mpsc::Receiver<()>,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!(range_id, "Poller worker starting...");

    let mut failures: u32 = 0;
    let mut delay = Duration::ZERO;

    loop {
        let settled = state_rx.borrow_and_update().status.is_settled();

        if settled {
            debug!(range_id, "Range settled, poller parked");
            tokio::select! {
                _ = &mut shutdown_signal => break,
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                trigger = trigger_rx.recv() => {
                    if trigger.is_none() {
                        break;
                    }
                    info!(range_id, "Gap recovery fetch");
                }
            }
        } else {
            let triggered = tokio::select! {
                _ = &mut shutdown_signal => break,
                _ = sleep_fn(delay) => false,
                trigger = trigger_rx.recv() => {
                    if trigger.is_none() {
                        break;
                    }
                    info!(range_id, "Gap recovery fetch");
                    true
                }
            };
            if !triggered && state_rx.borrow().status.is_settled() {
                continue;
            }
        }

        match poll_once(options, source, range_id, &sink, &mut failures).await {
            Some(next) => delay = next,
            None => break,
        }
    }

    info!(range_id, "Poller worker shutting down...");
}

/// Fetch once and report. Returns the delay before the next fetch, or `None`
/// when the engine is gone.
async fn poll_once(
    options: &Options,
    source: &dyn StatusSource,
    range_id: &str,
    sink: &mpsc::UnboundedSender<Observation>,
    failures: &mut u32,
) -> Option<Duration> {
    let result = match tokio::time::timeout(options.request_timeout, source.fetch_status(range_id)).await {
        Ok(result) => result,
        Err(_) => Err(WatchError::Timeout(format!(
            "status request exceeded {:?}",
            options.request_timeout
        ))),
    };

    match result {
        Ok(snapshot) => {
            if *failures > 0 {
                info!(range_id, failures = *failures, "Status endpoint recovered");
                sink.send(Observation::PollHealth(PollHealth::Healthy)).ok()?;
            }
            *failures = 0;
            debug!(range_id, status = %snapshot.status, "Polled deployment status");
            sink.send(Observation::Snapshot(snapshot)).ok()?;
            Some(options.interval)
        }
        Err(e) => {
            *failures = failures.saturating_add(1);
            let health = if *failures >= options.failure_threshold {
                PollHealth::StatusUnknown {
                    consecutive: *failures,
                }
            } else {
                PollHealth::Failing {
                    consecutive: *failures,
                }
            };
            warn!(range_id, failures = *failures, "Status poll failed: {}", e);
            sink.send(Observation::PollHealth(health)).ok()?;

            let backoff = options.backoff.delay(*failures - 1);
            Some(options.interval.max(backoff))
        }
    }
}
