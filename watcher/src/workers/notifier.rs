//! Notifier worker: turns store updates into UI signals

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::models::RangeState;
use crate::notify::{Notifier, Signal};
use crate::store::ResourceStore;

/// Notifier worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// How long a pulse stays lit
    pub pulse_window: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            pulse_window: Duration::from_secs(1),
        }
    }
}

/// Run the notifier worker for one range.
///
/// The store callback only forwards into a queue, so a slow notifier never
/// holds up a store update.
pub async fn run(
    options: &Options,
    range_id: &str,
    store: Arc<ResourceStore>,
    signals: broadcast::Sender<Signal>,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Arc<RangeState>>();
    let Some(subscription) = store.subscribe(range_id, move |state| {
        let _ = tx.send(state.clone());
    }) else {
        warn!(range_id, "Range not open, notifier not started");
        return;
    };

    info!(range_id, "Notifier worker starting...");

    let mut notifier = Notifier::new(range_id, options.pulse_window);
    let mut previous: Option<Arc<RangeState>> = None;

    loop {
        let next_expiry = notifier.next_expiry();
        tokio::select! {
            _ = &mut shutdown_signal => break,
            state = rx.recv() => {
                let Some(state) = state else {
                    break;
                };
                if let Some(prev) = &previous {
                    match notifier.observe(prev, &state, Instant::now()) {
                        Ok(batch) => publish(&signals, batch),
                        Err(e) => warn!(range_id, "Skipping notification cycle: {}", e),
                    }
                }
                previous = Some(state);
            }
            _ = sleep_until(next_expiry) => {
                publish(&signals, notifier.expire(Instant::now()));
            }
        }
    }

    store.unsubscribe(range_id, subscription);
    info!(range_id, "Notifier worker shutting down...");
}

fn publish(signals: &broadcast::Sender<Signal>, batch: Vec<Signal>) {
    for signal in batch {
        // no receivers is fine
        if signals.send(signal).is_err() {
            debug!("No signal receivers");
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
