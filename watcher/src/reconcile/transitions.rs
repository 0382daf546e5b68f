//! Event kind to status transition table

use range_api::{EventType, RangeStatus, RealtimeEvent, ResourceState};

use crate::models::ResourceKey;

/// What an event is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Range,
    Router,
    /// The network named by `network_id`
    Network,
    /// The VM named by `vm_id`
    Vm,
}

/// What an event does to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// The target resource moves to this status
    Resource(ResourceState),
    /// A new deployment attempt begins
    NewAttempt,
    /// The server reports this range-level status
    RangeReported(RangeStatus),
    /// The server declares the attempt failed
    RangeFailed,
}

/// One row of the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    pub event_type: EventType,
    pub target: Target,
    pub effect: Effect,
}

const fn rule(event_type: EventType, target: Target, effect: Effect) -> TransitionRule {
    TransitionRule {
        event_type,
        target,
        effect,
    }
}

/// Every event kind that changes state. Kinds not listed carry no transition.
pub const TRANSITIONS: &[TransitionRule] = &[
    rule(EventType::DeploymentStarted, Target::Range, Effect::NewAttempt),
    rule(
        EventType::DeploymentCompleted,
        Target::Range,
        Effect::RangeReported(RangeStatus::Running),
    ),
    rule(EventType::DeploymentFailed, Target::Range, Effect::RangeFailed),
    rule(
        EventType::RangeStopped,
        Target::Range,
        Effect::RangeReported(RangeStatus::Stopped),
    ),
    rule(
        EventType::RouterCreating,
        Target::Router,
        Effect::Resource(ResourceState::Creating),
    ),
    rule(
        EventType::RouterCreated,
        Target::Router,
        Effect::Resource(ResourceState::Created),
    ),
    rule(
        EventType::RouterFailed,
        Target::Router,
        Effect::Resource(ResourceState::Failed),
    ),
    rule(
        EventType::NetworkCreating,
        Target::Network,
        Effect::Resource(ResourceState::Creating),
    ),
    rule(
        EventType::NetworkCreated,
        Target::Network,
        Effect::Resource(ResourceState::Created),
    ),
    rule(
        EventType::NetworkFailed,
        Target::Network,
        Effect::Resource(ResourceState::Failed),
    ),
    rule(
        EventType::VmCreating,
        Target::Vm,
        Effect::Resource(ResourceState::Creating),
    ),
    rule(
        EventType::VmStarted,
        Target::Vm,
        Effect::Resource(ResourceState::Running),
    ),
    rule(
        EventType::VmStopped,
        Target::Vm,
        Effect::Resource(ResourceState::Stopped),
    ),
    rule(
        EventType::VmFailed,
        Target::Vm,
        Effect::Resource(ResourceState::Failed),
    ),
];

/// Look up the rule for an event kind
pub fn rule_for(event_type: EventType) -> Option<&'static TransitionRule> {
    TRANSITIONS.iter().find(|r| r.event_type == event_type)
}

/// Resolve the resource an event targets.
///
/// Returns `None` for range-level targets and for events missing the id
/// their target needs.
pub fn target_key(target: Target, event: &RealtimeEvent) -> Option<ResourceKey> {
    let non_empty = |id: &Option<String>| id.as_ref().filter(|id| !id.is_empty()).cloned();
    match target {
        Target::Range => None,
        Target::Router => Some(ResourceKey::Router),
        Target::Network => non_empty(&event.network_id).map(ResourceKey::Network),
        Target::Vm => non_empty(&event.vm_id).map(ResourceKey::Vm),
    }
}
