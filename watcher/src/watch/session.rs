//! One watched range: engine, poller, channel and notifier tasks

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use range_api::RangeStatus;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::errors::WatchError;
use crate::http::deployments::StatusSource;
use crate::notify::Signal;
use crate::realtime::EventChannel;
use crate::reconcile::{DeploymentListener, Engine, Observation};
use crate::store::ResourceStore;
use crate::workers::channel::{self, ChannelOutput};
use crate::workers::{notifier, poller, reconciler};

/// Everything a session needs, shared by all sessions
#[derive(Clone)]
pub struct WatchContext {
    pub source: Arc<dyn StatusSource>,
    pub store: Arc<ResourceStore>,
    pub listener: Arc<dyn DeploymentListener>,
    pub signals: broadcast::Sender<Signal>,
    pub poller: poller::Options,
    /// `None` runs the session on polling alone
    pub channel: Option<channel::Options>,
    pub notifier: notifier::Options,
}

/// Live state of a watched range.
///
/// Dropping the session tears it down.
pub struct RangeSession {
    range_id: String,
    alive: Arc<AtomicBool>,
    store: Arc<ResourceStore>,
    observations: mpsc::UnboundedSender<Observation>,
    trigger: mpsc::Sender<()>,
    channel: Option<EventChannel>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl RangeSession {
    /// Open the range in the store and spawn its tasks
    pub fn start(range_id: &str, ctx: &WatchContext) -> Self {
        info!(range_id, "Starting watch session");

        ctx.store.open(range_id);
        let alive = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let (obs_tx, obs_rx) = mpsc::unbounded_channel::<Observation>();
        let (trigger_tx, trigger_rx) = mpsc::channel::<()>(1);
        let mut tasks = Vec::new();

        let engine = Engine::new(range_id, ctx.store.clone(), ctx.listener.clone(), alive.clone());
        tasks.push(tokio::spawn(reconciler::run(engine, obs_rx)));

        let channel = ctx.channel.clone().map(|options| {
            let (out_tx, out_rx) = mpsc::unbounded_channel();
            let mut channel = EventChannel::new(options, out_tx);
            channel.connect(range_id);
            tasks.push(tokio::spawn(forward_channel(
                range_id.to_string(),
                out_rx,
                obs_tx.clone(),
                trigger_tx.clone(),
            )));
            channel
        });

        if let Some(state_rx) = ctx.store.watch(range_id) {
            let options = ctx.poller.clone();
            let source = ctx.source.clone();
            let sink = obs_tx.clone();
            let owned_range_id = range_id.to_string();
            let mut shutdown_rx = shutdown_tx.subscribe();
            tasks.push(tokio::spawn(async move {
                poller::run(
                    &options,
                    source.as_ref(),
                    &owned_range_id,
                    state_rx,
                    sink,
                    trigger_rx,
                    tokio::time::sleep,
                    Box::pin(async move {
                        let _ = shutdown_rx.recv().await;
                    }),
                )
                .await;
            }));
        }

        {
            let options = ctx.notifier.clone();
            let store = ctx.store.clone();
            let signals = ctx.signals.clone();
            let owned_range_id = range_id.to_string();
            let mut shutdown_rx = shutdown_tx.subscribe();
            tasks.push(tokio::spawn(async move {
                notifier::run(
                    &options,
                    &owned_range_id,
                    store,
                    signals,
                    Box::pin(async move {
                        let _ = shutdown_rx.recv().await;
                    }),
                )
                .await;
            }));
        }

        Self {
            range_id: range_id.to_string(),
            alive,
            store: ctx.store.clone(),
            observations: obs_tx,
            trigger: trigger_tx,
            channel,
            shutdown_tx,
            tasks,
        }
    }

    pub fn range_id(&self) -> &str {
        &self.range_id
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Show `status` until the next real observation
    pub fn optimistic(&self, status: RangeStatus) -> Result<(), WatchError> {
        if !self.is_alive() {
            return Err(WatchError::NotFound(self.range_id.clone()));
        }
        self.observations
            .send(Observation::Optimistic(status))
            .map_err(|_| WatchError::ChannelError("reconciler is gone".to_string()))
    }

    /// Ask the poller for one immediate fetch
    pub fn refresh(&self) {
        let _ = self.trigger.try_send(());
    }

    /// Stop everything and discard the range state. Safe to call twice.
    pub fn teardown(&mut self) {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return;
        }

        let _ = self.shutdown_tx.send(());
        if let Some(channel) = self.channel.as_mut() {
            channel.disconnect();
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.store.clear(&self.range_id);

        info!(range_id = %self.range_id, "Watch session torn down");
    }
}

impl Drop for RangeSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Route channel output to the engine. A resumed subscription triggers one
/// poll to cover events missed while disconnected.
async fn forward_channel(
    range_id: String,
    mut output: mpsc::UnboundedReceiver<ChannelOutput>,
    observations: mpsc::UnboundedSender<Observation>,
    trigger: mpsc::Sender<()>,
) {
    while let Some(out) = output.recv().await {
        let observation = match out {
            ChannelOutput::State(state) => Observation::Connection(state),
            ChannelOutput::Event(event) => Observation::Event(event),
            ChannelOutput::Subscribed { resumed } => {
                if resumed {
                    debug!(range_id = %range_id, "Resubscribed, requesting gap recovery poll");
                    // a pending trigger already covers this one
                    let _ = trigger.try_send(());
                }
                continue;
            }
        };
        if observations.send(observation).is_err() {
            break;
        }
    }
}
