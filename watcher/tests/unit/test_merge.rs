//! Merge unit tests

use chrono::Utc;
use rangewatch::models::{
    DeploymentSnapshot, EventType, ObservationSource, RangeState, RangeStatus, RealtimeEvent,
    ResourceKey, ResourceState, ResourceStatus,
};
use rangewatch::reconcile::{merge, ConflictKind, Observation};

const RANGE: &str = "range-42";

fn event(event_type: EventType) -> RealtimeEvent {
    RealtimeEvent::new(event_type, RANGE)
}

fn apply_all(mut state: RangeState, observations: &[Observation]) -> RangeState {
    for observation in observations {
        state = merge(&state, observation, Utc::now()).state;
    }
    state
}

/// Router, two networks and three VMs brought up by events only
fn deployment_events() -> Vec<Observation> {
    let mut events = vec![
        event(EventType::DeploymentStarted),
        event(EventType::RouterCreating),
        event(EventType::RouterCreated),
    ];
    for net in ["net-a", "net-b"] {
        events.push(event(EventType::NetworkCreating).with_network(net));
        events.push(event(EventType::NetworkCreated).with_network(net));
    }
    for vm in ["vm-1", "vm-2", "vm-3"] {
        events.push(event(EventType::VmCreating).with_vm(vm));
    }
    for vm in ["vm-1", "vm-2", "vm-3"] {
        events.push(event(EventType::VmStarted).with_vm(vm));
    }
    events.into_iter().map(Observation::Event).collect()
}

fn stale_snapshot() -> DeploymentSnapshot {
    DeploymentSnapshot {
        status: RangeStatus::Deploying,
        elapsed_seconds: 12,
        summary: Default::default(),
        router: Some(ResourceStatus::new(None, "router", ResourceState::Created)),
        networks: vec![
            ResourceStatus::new(Some("net-a".into()), "dmz", ResourceState::Creating),
            ResourceStatus::new(Some("net-b".into()), "internal", ResourceState::Pending),
        ],
        vms: vec![
            ResourceStatus::new(Some("vm-1".into()), "kali", ResourceState::Creating),
            ResourceStatus::new(Some("vm-2".into()), "web", ResourceState::Pending),
            ResourceStatus::new(Some("vm-3".into()), "db", ResourceState::Creating),
        ],
    }
}

#[test]
fn test_full_deployment_with_stale_snapshot_last() {
    let state = apply_all(RangeState::new(RANGE), &deployment_events());
    assert_eq!(state.status, RangeStatus::Running);
    assert_eq!(state.summary().completed, 6);

    let outcome = merge(&state, &Observation::Snapshot(stale_snapshot()), Utc::now());

    assert_eq!(outcome.state.status, RangeStatus::Running);
    for (key, entry) in outcome.state.entries() {
        assert!(entry.status().is_success(), "{} regressed to {}", key, entry.status());
        assert_eq!(entry.last_source, ObservationSource::Event);
    }
    assert_eq!(outcome.conflicts.len(), 5);
    assert!(outcome
        .conflicts
        .iter()
        .all(|c| c.kind == ConflictKind::StaleObservation && c.observed_source == ObservationSource::Poll));
}

#[test]
fn test_snapshot_first_then_events() {
    let state = apply_all(
        RangeState::new(RANGE),
        &[Observation::Snapshot(stale_snapshot())],
    );
    assert_eq!(state.status, RangeStatus::Deploying);
    assert_eq!(state.elapsed_seconds, 12);

    let mut events = deployment_events();
    // the start event would open a fresh attempt
    events.remove(0);
    let state = apply_all(state, &events);

    assert_eq!(state.status, RangeStatus::Running);
    let vm = state.entry(&ResourceKey::Vm("vm-2".into())).unwrap();
    assert_eq!(vm.resource.name, "web");
    assert_eq!(vm.status(), ResourceState::Running);
}

#[test]
fn test_duplicate_observations_are_idempotent() {
    let mut observations = deployment_events();
    observations.push(Observation::Snapshot(stale_snapshot()));

    let once = apply_all(RangeState::new(RANGE), &observations);
    let doubled: Vec<Observation> = observations
        .iter()
        .flat_map(|o| [o.clone(), o.clone()])
        .collect();
    let twice = apply_all(RangeState::new(RANGE), &doubled);

    assert_eq!(once.to_snapshot(), twice.to_snapshot());
    assert_eq!(once.attempt, twice.attempt);
    assert_eq!(once.status, twice.status);

    let last = observations.last().unwrap();
    assert!(!merge(&once, last, Utc::now()).changed);
}

#[test]
fn test_events_for_other_ranges_are_ignored() {
    let state = RangeState::new(RANGE);
    let foreign = RealtimeEvent::new(EventType::VmStarted, "range-7").with_vm("vm-1");
    let outcome = merge(&state, &Observation::Event(foreign), Utc::now());

    assert!(!outcome.changed);
    assert!(outcome.state.vms.is_empty());
}

#[test]
fn test_unknown_event_kinds_carry_no_transition() {
    let state = RangeState::new(RANGE);
    let step = event(EventType::DeploymentStep).with_message("configuring firewall");
    assert!(!merge(&state, &Observation::Event(step), Utc::now()).changed);

    let json = r#"{"event_type": "vm_snapshotted", "range_id": "range-42", "vm_id": "vm-1"}"#;
    let unknown: RealtimeEvent = serde_json::from_str(json).unwrap();
    assert_eq!(unknown.event_type, EventType::Unknown);
    assert!(!merge(&state, &Observation::Event(unknown), Utc::now()).changed);
}

#[test]
fn test_deployment_failed_is_range_error() {
    let state = apply_all(
        RangeState::new(RANGE),
        &[
            Observation::Event(event(EventType::DeploymentStarted)),
            Observation::Event(event(EventType::VmCreating).with_vm("vm-1")),
            Observation::Event(event(EventType::DeploymentFailed).with_message("quota exceeded")),
        ],
    );
    assert_eq!(state.status, RangeStatus::Error);
    assert_eq!(state.status_detail.as_deref(), Some("quota exceeded"));

    // a late success does not revive the attempt
    let state = apply_all(
        state,
        &[Observation::Event(event(EventType::VmStarted).with_vm("vm-1"))],
    );
    assert_eq!(state.status, RangeStatus::Error);
}

#[test]
fn test_optimistic_overlay_until_first_observation() {
    let state = RangeState::new(RANGE);
    let state = merge(&state, &Observation::Optimistic(RangeStatus::Deploying), Utc::now()).state;
    assert_eq!(state.visible_status(), RangeStatus::Deploying);
    assert_eq!(state.status, RangeStatus::Draft);

    let state = merge(&state, &Observation::Snapshot(stale_snapshot()), Utc::now()).state;
    assert_eq!(state.optimistic, None);
    assert_eq!(state.visible_status(), RangeStatus::Deploying);
}

#[test]
fn test_status_detail_follows_latest_snapshot() {
    let mut snapshot = stale_snapshot();
    snapshot.vms[0].status_detail = Some("pulling image".into());
    let state = apply_all(RangeState::new(RANGE), &[Observation::Snapshot(snapshot.clone())]);

    snapshot.vms[0].status_detail = Some("booting".into());
    let state = apply_all(state, &[Observation::Snapshot(snapshot)]);

    let vm = state.entry(&ResourceKey::Vm("vm-1".into())).unwrap();
    assert_eq!(vm.resource.status_detail.as_deref(), Some("booting"));
}
