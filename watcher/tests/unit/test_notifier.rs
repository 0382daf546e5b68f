//! Notifier unit tests

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use rangewatch::models::{EventType, RealtimeEvent, ResourceKey, ResourceState};
use rangewatch::notify::{Signal, ToastLevel};
use rangewatch::reconcile::{Engine, LoggingListener, Observation};
use rangewatch::store::ResourceStore;
use rangewatch::workers::notifier;
use tokio::sync::{broadcast, oneshot};

const RANGE: &str = "range-42";

struct Harness {
    engine: Engine,
    signals: broadcast::Receiver<Signal>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

async fn start() -> Harness {
    let store = Arc::new(ResourceStore::new());
    store.open(RANGE);

    let (signal_tx, signals) = broadcast::channel(64);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let options = notifier::Options {
        pulse_window: Duration::from_secs(1),
    };

    let worker_store = store.clone();
    let handle = tokio::spawn(async move {
        notifier::run(
            &options,
            RANGE,
            worker_store,
            signal_tx,
            Box::pin(async move {
                let _ = shutdown_rx.await;
            }),
        )
        .await;
    });
    settle().await;

    let engine = Engine::new(
        RANGE,
        store,
        Arc::new(LoggingListener),
        Arc::new(AtomicBool::new(true)),
    );

    Harness {
        engine,
        signals,
        shutdown_tx: Some(shutdown_tx),
        handle,
    }
}

/// Let spawned tasks catch up without reaching any pulse deadline
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn drain(rx: &mut broadcast::Receiver<Signal>) -> Vec<Signal> {
    let mut out = Vec::new();
    while let Ok(signal) = rx.try_recv() {
        out.push(signal);
    }
    out
}

fn vm_event(event_type: EventType, vm: &str) -> Observation {
    Observation::Event(RealtimeEvent::new(event_type, RANGE).with_vm(vm))
}

#[tokio::test(start_paused = true)]
async fn test_pulse_and_success_toast() {
    let mut h = start().await;

    h.engine
        .apply(Observation::Event(RealtimeEvent::new(EventType::DeploymentStarted, RANGE)));
    h.engine.apply(vm_event(EventType::VmCreating, "vm-1"));
    settle().await;
    // first appearance is not a change
    assert!(drain(&mut h.signals).is_empty());

    h.engine.apply(vm_event(EventType::VmStarted, "vm-1"));
    settle().await;

    let signals = drain(&mut h.signals);
    assert_eq!(signals.len(), 2);
    assert!(matches!(
        &signals[0],
        Signal::Pulse { resource: ResourceKey::Vm(id), status: ResourceState::Running, .. } if id == "vm-1"
    ));
    assert!(matches!(
        &signals[1],
        Signal::Toast { level: ToastLevel::Success, resource: None, .. }
    ));

    tokio::time::sleep(Duration::from_secs(1)).await;
    let signals = drain(&mut h.signals);
    assert!(matches!(
        signals.as_slice(),
        [Signal::PulseExpired { resource: ResourceKey::Vm(_), .. }]
    ));

    if let Some(tx) = h.shutdown_tx.take() {
        let _ = tx.send(());
    }
    h.handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failure_toasts_are_not_repeated() {
    let mut h = start().await;

    h.engine
        .apply(Observation::Event(RealtimeEvent::new(EventType::DeploymentStarted, RANGE)));
    h.engine.apply(vm_event(EventType::VmCreating, "vm-1"));
    h.engine.apply(vm_event(EventType::VmCreating, "vm-2"));
    settle().await;
    drain(&mut h.signals);

    h.engine.apply(Observation::Event(
        RealtimeEvent::new(EventType::VmFailed, RANGE)
            .with_vm("vm-1")
            .with_message("no capacity"),
    ));
    settle().await;

    let toasts: Vec<Signal> = drain(&mut h.signals)
        .into_iter()
        .filter(|s| matches!(s, Signal::Toast { .. }))
        .collect();
    assert_eq!(toasts.len(), 2);
    assert!(toasts.iter().any(|s| matches!(
        s,
        Signal::Toast { resource: Some(ResourceKey::Vm(id)), message, .. }
            if id == "vm-1" && message.contains("no capacity")
    )));

    // the range stays in error, the failure is not toasted again
    h.engine.apply(Observation::Event(
        RealtimeEvent::new(EventType::DeploymentFailed, RANGE).with_message("vm-1 failed"),
    ));
    h.engine.apply(vm_event(EventType::VmStarted, "vm-2"));
    settle().await;
    let toasts = drain(&mut h.signals)
        .into_iter()
        .filter(|s| matches!(s, Signal::Toast { .. }))
        .count();
    assert_eq!(toasts, 0);

    h.handle.abort();
}
