//! Watcher and session unit tests

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use rangewatch::errors::WatchError;
use rangewatch::http::StatusSource;
use rangewatch::models::{
    DeploymentSnapshot, EventType, RangeStatus, RealtimeEvent, ResourceState, ResourceStatus,
};
use rangewatch::reconcile::DeploymentListener;
use rangewatch::store::ResourceStore;
use rangewatch::utils::CooldownOptions;
use rangewatch::watch::{WatchContext, Watcher};
use rangewatch::workers::{channel, notifier, poller};
use range_api::ServerMessage;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use url::Url;

const RANGE: &str = "range-42";

/// Answers with a finished deployment, or never answers at all
struct FixedSource {
    hang: bool,
    calls: AtomicU32,
}

#[async_trait]
impl StatusSource for FixedSource {
    async fn fetch_status(&self, _range_id: &str) -> Result<DeploymentSnapshot, WatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        Ok(DeploymentSnapshot {
            status: RangeStatus::Running,
            elapsed_seconds: 40,
            summary: Default::default(),
            router: Some(ResourceStatus::new(None, "router", ResourceState::Created)),
            networks: vec![ResourceStatus::new(
                Some("net-a".into()),
                "dmz",
                ResourceState::Created,
            )],
            vms: vec![ResourceStatus::new(
                Some("vm-1".into()),
                "kali",
                ResourceState::Running,
            )],
        })
    }
}

#[derive(Default)]
struct CountingListener {
    completed: AtomicU32,
}

impl DeploymentListener for CountingListener {
    fn on_deployment_complete(&self, _range_id: &str) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

fn watcher(hang: bool) -> (Watcher, Arc<FixedSource>, Arc<CountingListener>) {
    let source = Arc::new(FixedSource {
        hang,
        calls: AtomicU32::new(0),
    });
    let listener = Arc::new(CountingListener::default());
    let (signals, _) = broadcast::channel(16);
    let ctx = WatchContext {
        source: source.clone(),
        store: Arc::new(ResourceStore::new()),
        listener: listener.clone(),
        signals,
        poller: poller::Options::default(),
        channel: None,
        notifier: notifier::Options::default(),
    };
    (Watcher::new(ctx), source, listener)
}

async fn wait_for(mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_watch_populates_store() {
    let (watcher, _source, listener) = watcher(false);

    assert!(watcher.watch(RANGE));
    assert!(!watcher.watch(RANGE));
    assert!(watcher.is_watched(RANGE));
    assert_eq!(watcher.watched(), vec![RANGE.to_string()]);

    let store = watcher.store().clone();
    wait_for(|| store.status(RANGE) == Some(RangeStatus::Running)).await;

    let snapshot = store.get(RANGE).unwrap();
    assert_eq!(snapshot.vms.len(), 1);
    assert_eq!(snapshot.networks.len(), 1);
    assert!(snapshot.router.is_some());
    assert_eq!(snapshot.summary.completed, 3);
    // already finished when first seen
    assert_eq!(listener.completed.load(Ordering::SeqCst), 0);

    watcher.shutdown();
}

#[tokio::test]
async fn test_unwatch_discards_state() {
    let (watcher, _source, _listener) = watcher(false);
    watcher.watch(RANGE);
    let store = watcher.store().clone();
    wait_for(|| store.get(RANGE).is_some_and(|s| !s.vms.is_empty())).await;

    assert!(watcher.unwatch(RANGE));
    assert!(!watcher.unwatch(RANGE));
    assert!(store.get(RANGE).is_none());
    assert!(!store.is_open(RANGE));

    assert!(matches!(
        watcher.optimistic(RANGE, RangeStatus::Deploying),
        Err(WatchError::NotFound(_))
    ));
    tokio_test::assert_err!(watcher.refresh(RANGE));
}

#[tokio::test]
async fn test_optimistic_overlay_is_visible() {
    let (watcher, source, _listener) = watcher(true);
    watcher.watch(RANGE);
    wait_for(|| source.calls.load(Ordering::SeqCst) == 1).await;

    tokio_test::assert_ok!(watcher.optimistic(RANGE, RangeStatus::Deploying));

    let store = watcher.store().clone();
    wait_for(|| store.view(RANGE).is_some_and(|v| v.optimistic)).await;
    assert_eq!(store.get(RANGE).unwrap().status, RangeStatus::Deploying);

    watcher.shutdown();
    assert!(watcher.watched().is_empty());
}

/// Reports both VMs pending at first, then both up
#[derive(Default)]
struct CatchUpSource {
    calls: AtomicU32,
}

#[async_trait]
impl StatusSource for CatchUpSource {
    async fn fetch_status(&self, _range_id: &str) -> Result<DeploymentSnapshot, WatchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let (range, vm) = if call == 0 {
            (RangeStatus::Deploying, ResourceState::Pending)
        } else {
            (RangeStatus::Running, ResourceState::Running)
        };
        Ok(DeploymentSnapshot {
            status: range,
            elapsed_seconds: 12,
            summary: Default::default(),
            router: None,
            networks: vec![],
            vms: ["vm-1", "vm-2"]
                .iter()
                .map(|id| ResourceStatus::new(Some(id.to_string()), *id, vm))
                .collect(),
        })
    }
}

async fn push(ws: &mut WebSocketStream<TcpStream>, message: &ServerMessage) {
    let text = serde_json::to_string(message).unwrap();
    ws.send(Message::Text(text.into())).await.unwrap();
}

async fn accept_subscriber(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = accept_async(stream).await.unwrap();
    while let Some(Ok(message)) = ws.next().await {
        if let Message::Text(_) = message {
            break;
        }
    }
    push(&mut ws, &ServerMessage::Subscribed { range_id: RANGE.into() }).await;
    ws
}

/// Pushes the start of a deployment, drops the connection before the VMs come
/// up, then serves the reconnect without replaying anything
async fn flaky_push_server(listener: TcpListener) {
    let mut ws = accept_subscriber(&listener).await;
    push(
        &mut ws,
        &ServerMessage::Event(RealtimeEvent::new(EventType::DeploymentStarted, RANGE)),
    )
    .await;
    push(
        &mut ws,
        &ServerMessage::Event(RealtimeEvent::new(EventType::VmCreating, RANGE).with_vm("vm-1")),
    )
    .await;
    ws.close(None).await.unwrap();
    while let Some(Ok(_)) = ws.next().await {}

    let mut ws = accept_subscriber(&listener).await;
    while let Some(Ok(_)) = ws.next().await {}
}

#[tokio::test]
async fn test_reconnect_catches_up_without_waiting_for_poll() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(flaky_push_server(listener));

    let mut push_options =
        channel::Options::new(Url::parse(&format!("ws://127.0.0.1:{}/ws", port)).unwrap());
    push_options.reconnect = CooldownOptions {
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        multiplier: 2.0,
    };

    let source = Arc::new(CatchUpSource::default());
    let (signals, _) = broadcast::channel(16);
    let watcher = Watcher::new(WatchContext {
        source: source.clone(),
        store: Arc::new(ResourceStore::new()),
        listener: Arc::new(CountingListener::default()),
        signals,
        // only the resubscription can cause a second fetch within the test
        poller: poller::Options {
            interval: Duration::from_secs(3600),
            ..Default::default()
        },
        channel: Some(push_options),
        notifier: notifier::Options::default(),
    });

    watcher.watch(RANGE);
    let store = watcher.store().clone();
    wait_for(|| store.status(RANGE) == Some(RangeStatus::Running)).await;

    let snapshot = store.get(RANGE).unwrap();
    assert_eq!(snapshot.vms.len(), 2);
    assert!(snapshot
        .vms
        .iter()
        .all(|vm| vm.status == ResourceState::Running));
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);

    watcher.shutdown();
    server.abort();
}
