//! Pulse and toast bookkeeping for one range

use std::collections::HashMap;
use std::time::Duration;

use range_api::{RangeStatus, ResourceState};
use tokio::time::Instant;

use crate::models::{RangeState, ResourceKey};
use crate::notify::diff::{diff, NotifyError, ResourceChange};
use crate::notify::signals::{Signal, ToastLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToastTrigger {
    RangeRunning,
    RangeError,
    ResourceFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ToastSubject {
    Range,
    Resource(ResourceKey),
}

#[derive(Debug)]
struct PendingPulse {
    id: u64,
    resource: ResourceKey,
    expires_at: Instant,
}

/// Turns consecutive states of one range into signals
#[derive(Debug)]
pub struct Notifier {
    range_id: String,
    pulse_window: Duration,
    next_pulse_id: u64,
    pulses: Vec<PendingPulse>,
    toasted: HashMap<ToastSubject, ToastTrigger>,
}

impl Notifier {
    pub fn new(range_id: impl Into<String>, pulse_window: Duration) -> Self {
        Self {
            range_id: range_id.into(),
            pulse_window,
            next_pulse_id: 0,
            pulses: Vec::new(),
            toasted: HashMap::new(),
        }
    }

    /// Signals for the step from `prev` to `next`.
    ///
    /// The first population of an empty range is a baseline and emits nothing.
    pub fn observe(
        &mut self,
        prev: &RangeState,
        next: &RangeState,
        now: Instant,
    ) -> Result<Vec<Signal>, NotifyError> {
        let diff = diff(prev, next)?;

        if diff.new_attempt {
            self.toasted.clear();
        }
        if prev.is_unpopulated() {
            return Ok(Vec::new());
        }

        let mut signals = Vec::new();

        for change in &diff.changes {
            if change.from.is_some() {
                signals.push(self.pulse(&change.resource, change.to, now));
            }
            if let Some(toast) = self.resource_toast(change) {
                signals.push(toast);
            }
        }

        if diff.range_changed() {
            if let Some(toast) = self.range_toast(diff.range_to, next.status_detail.as_deref()) {
                signals.push(toast);
            }
        }

        Ok(signals)
    }

    /// Deadline of the earliest pending pulse
    pub fn next_expiry(&self) -> Option<Instant> {
        self.pulses.iter().map(|p| p.expires_at).min()
    }

    /// Expire every pulse due at `now`
    pub fn expire(&mut self, now: Instant) -> Vec<Signal> {
        let (due, pending): (Vec<_>, Vec<_>) =
            self.pulses.drain(..).partition(|p| p.expires_at <= now);
        self.pulses = pending;
        due.into_iter()
            .map(|p| Signal::PulseExpired {
                id: p.id,
                range_id: self.range_id.clone(),
                resource: p.resource,
            })
            .collect()
    }

    fn pulse(&mut self, resource: &ResourceKey, status: ResourceState, now: Instant) -> Signal {
        self.next_pulse_id += 1;
        let expires_at = now + self.pulse_window;
        self.pulses.push(PendingPulse {
            id: self.next_pulse_id,
            resource: resource.clone(),
            expires_at,
        });
        Signal::Pulse {
            id: self.next_pulse_id,
            range_id: self.range_id.clone(),
            resource: resource.clone(),
            status,
            expires_at,
        }
    }

    fn resource_toast(&mut self, change: &ResourceChange) -> Option<Signal> {
        let subject = ToastSubject::Resource(change.resource.clone());
        if change.to != ResourceState::Failed {
            self.toasted.remove(&subject);
            return None;
        }
        if !self.arm(subject, ToastTrigger::ResourceFailed) {
            return None;
        }
        let message = match &change.status_detail {
            Some(detail) => format!("{} failed: {}", change.name, detail),
            None => format!("{} failed", change.name),
        };
        Some(Signal::Toast {
            range_id: self.range_id.clone(),
            level: ToastLevel::Error,
            resource: Some(change.resource.clone()),
            message,
        })
    }

    fn range_toast(&mut self, status: RangeStatus, detail: Option<&str>) -> Option<Signal> {
        let (trigger, level, message) = match status {
            RangeStatus::Running => (
                ToastTrigger::RangeRunning,
                ToastLevel::Success,
                format!("Range {} deployed", self.range_id),
            ),
            RangeStatus::Error => (
                ToastTrigger::RangeError,
                ToastLevel::Error,
                match detail {
                    Some(detail) => format!("Range {} deployment failed: {}", self.range_id, detail),
                    None => format!("Range {} deployment failed", self.range_id),
                },
            ),
            _ => {
                self.toasted.remove(&ToastSubject::Range);
                return None;
            }
        };
        if !self.arm(ToastSubject::Range, trigger) {
            return None;
        }
        Some(Signal::Toast {
            range_id: self.range_id.clone(),
            level,
            resource: None,
            message,
        })
    }

    /// Record a toast, returning `false` if the same one was already shown
    fn arm(&mut self, subject: ToastSubject, trigger: ToastTrigger) -> bool {
        self.toasted.insert(subject, trigger) != Some(trigger)
    }
}
