//! Poller unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rangewatch::errors::WatchError;
use rangewatch::http::StatusSource;
use rangewatch::models::{DeploymentSnapshot, PollHealth, RangeState, RangeStatus};
use rangewatch::reconcile::Observation;
use rangewatch::workers::poller;
use tokio::sync::{mpsc, oneshot, watch};

const RANGE: &str = "range-42";

/// Replays scripted results, then keeps answering with a deploying snapshot
#[derive(Default)]
struct ScriptedSource {
    script: Mutex<VecDeque<Result<DeploymentSnapshot, String>>>,
    calls: AtomicU32,
}

impl ScriptedSource {
    fn with_script(script: Vec<Result<DeploymentSnapshot, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    async fn fetch_status(&self, _range_id: &str) -> Result<DeploymentSnapshot, WatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(snapshot)) => Ok(snapshot),
            Some(Err(message)) => Err(WatchError::StatusError(message)),
            None => Ok(deploying()),
        }
    }
}

/// Accepts every request and never answers
#[derive(Default)]
struct StalledSource {
    calls: AtomicU32,
}

#[async_trait]
impl StatusSource for StalledSource {
    async fn fetch_status(&self, _range_id: &str) -> Result<DeploymentSnapshot, WatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

fn deploying() -> DeploymentSnapshot {
    DeploymentSnapshot {
        status: RangeStatus::Deploying,
        elapsed_seconds: 3,
        summary: Default::default(),
        router: None,
        networks: vec![],
        vms: vec![],
    }
}

struct Harness<S> {
    source: Arc<S>,
    state_tx: watch::Sender<Arc<RangeState>>,
    observations: mpsc::UnboundedReceiver<Observation>,
    trigger_tx: mpsc::Sender<()>,
    shutdown_tx: oneshot::Sender<()>,
    handle: tokio::task::JoinHandle<()>,
}

fn start<S: StatusSource + Send + Sync + 'static>(source: S) -> Harness<S> {
    let source = Arc::new(source);
    let (state_tx, state_rx) = watch::channel(Arc::new(RangeState::new(RANGE)));
    let (sink, observations) = mpsc::unbounded_channel();
    let (trigger_tx, trigger_rx) = mpsc::channel(1);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let options = poller::Options {
        failure_threshold: 3,
        ..Default::default()
    };
    let worker_source = source.clone();
    let handle = tokio::spawn(async move {
        poller::run(
            &options,
            worker_source.as_ref(),
            RANGE,
            state_rx,
            sink,
            trigger_rx,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.await;
            }),
        )
        .await;
    });

    Harness {
        source,
        state_tx,
        observations,
        trigger_tx,
        shutdown_tx,
        handle,
    }
}

async fn stop<S>(h: Harness<S>) {
    let _ = h.shutdown_tx.send(());
    h.handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failures_escalate_then_recover() {
    let mut h = start(ScriptedSource::with_script(vec![
        Err("502".into()),
        Err("502".into()),
        Err("502".into()),
        Ok(deploying()),
    ]));

    let mut health = Vec::new();
    for _ in 0..3 {
        match h.observations.recv().await.unwrap() {
            Observation::PollHealth(p) => health.push(p),
            other => panic!("unexpected observation: {:?}", other),
        }
    }
    assert_eq!(
        health,
        vec![
            PollHealth::Failing { consecutive: 1 },
            PollHealth::Failing { consecutive: 2 },
            PollHealth::StatusUnknown { consecutive: 3 },
        ]
    );

    assert_eq!(
        h.observations.recv().await,
        Some(Observation::PollHealth(PollHealth::Healthy))
    );
    assert!(matches!(
        h.observations.recv().await,
        Some(Observation::Snapshot(_))
    ));

    stop(h).await;
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_requests_count_as_failures() {
    let mut h = start(StalledSource::default());
    let started = tokio::time::Instant::now();
    let request_timeout = poller::Options::default().request_timeout;

    assert_eq!(
        h.observations.recv().await,
        Some(Observation::PollHealth(PollHealth::Failing { consecutive: 1 }))
    );
    assert!(started.elapsed() >= request_timeout);

    assert_eq!(
        h.observations.recv().await,
        Some(Observation::PollHealth(PollHealth::Failing { consecutive: 2 }))
    );
    assert_eq!(
        h.observations.recv().await,
        Some(Observation::PollHealth(PollHealth::StatusUnknown { consecutive: 3 }))
    );
    assert_eq!(h.source.calls.load(Ordering::SeqCst), 3);

    stop(h).await;
}

#[tokio::test(start_paused = true)]
async fn test_parks_when_settled_and_fetches_on_trigger() {
    let mut h = start(ScriptedSource::default());

    assert!(matches!(
        h.observations.recv().await,
        Some(Observation::Snapshot(_))
    ));

    let mut settled = RangeState::new(RANGE);
    settled.status = RangeStatus::Running;
    h.state_tx.send(Arc::new(settled)).unwrap();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(h.source.calls() <= 2);
    let parked = h.source.calls();
    while h.observations.try_recv().is_ok() {}

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.source.calls(), parked);

    h.trigger_tx.send(()).await.unwrap();
    assert!(matches!(
        h.observations.recv().await,
        Some(Observation::Snapshot(_))
    ));
    assert_eq!(h.source.calls(), parked + 1);

    stop(h).await;
}

#[tokio::test(start_paused = true)]
async fn test_stops_when_engine_is_gone() {
    let h = start(ScriptedSource::default());
    drop(h.observations);

    tokio::time::timeout(Duration::from_secs(5), h.handle)
        .await
        .expect("poller kept running")
        .unwrap();
}
