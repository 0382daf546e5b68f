//! Event channel adapter: one push subscription at a time

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::workers::channel::{self, ChannelOutput};

struct Subscription {
    range_id: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

/// Owns the channel worker of a range.
///
/// Connection state, events and resubscriptions are reported on the
/// `output` sender given at construction. The adapter never touches the
/// store.
pub struct EventChannel {
    options: channel::Options,
    output: mpsc::UnboundedSender<ChannelOutput>,
    active: Option<Subscription>,
}

impl EventChannel {
    pub fn new(options: channel::Options, output: mpsc::UnboundedSender<ChannelOutput>) -> Self {
        Self {
            options,
            output,
            active: None,
        }
    }

    /// Subscribe to `range_id`.
    ///
    /// A no-op returning `false` while the same range is already subscribed.
    /// A subscription to another range is torn down first.
    pub fn connect(&mut self, range_id: &str) -> bool {
        if let Some(active) = &self.active {
            if active.range_id == range_id && !active.handle.is_finished() {
                debug!(range_id, "Already subscribed");
                return false;
            }
        }
        self.disconnect();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let options = self.options.clone();
        let output = self.output.clone();
        let owned_range_id = range_id.to_string();

        let handle = tokio::spawn(async move {
            channel::run(
                &options,
                &owned_range_id,
                output,
                Box::pin(async move {
                    let _ = shutdown_rx.await;
                }),
            )
            .await;
        });

        self.active = Some(Subscription {
            range_id: range_id.to_string(),
            shutdown_tx: Some(shutdown_tx),
            handle,
        });
        true
    }

    /// Tear the subscription down. The worker unsubscribes and closes the
    /// socket on its own.
    pub fn disconnect(&mut self) {
        if let Some(mut active) = self.active.take() {
            debug!(range_id = %active.range_id, "Disconnecting event channel");
            if let Some(tx) = active.shutdown_tx.take() {
                let _ = tx.send(());
            }
        }
    }

    /// Range currently subscribed, if any
    pub fn range_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.range_id.as_str())
    }

    /// Disconnect and wait up to `timeout` for the worker to finish
    pub async fn shutdown(mut self, timeout: Duration) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        if let Some(tx) = active.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if tokio::time::timeout(timeout, &mut active.handle).await.is_err() {
            warn!(range_id = %active.range_id, "Channel worker did not stop in time, aborting");
            active.handle.abort();
        }
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}
