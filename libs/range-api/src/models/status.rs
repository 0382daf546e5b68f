//! Deployment status vocabulary

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of a single router, network or VM within a deployment attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceState {
    /// Known but not started
    Pending,

    /// Provisioning in progress
    Creating,

    /// VM booted
    Running,

    /// Router or network provisioned
    Created,

    /// VM stopped by an operator
    Stopped,

    /// Provisioning failed
    Failed,
}

impl ResourceState {
    /// Position in the logical progression of a deployment attempt.
    ///
    /// All terminal states share the highest rank. A status with a lower rank
    /// than the one already observed is stale.
    pub const fn rank(self) -> u8 {
        match self {
            ResourceState::Pending => 0,
            ResourceState::Creating => 1,
            ResourceState::Running
            | ResourceState::Created
            | ResourceState::Stopped
            | ResourceState::Failed => 2,
        }
    }

    /// No further transition happens for the current attempt
    pub const fn is_terminal(self) -> bool {
        self.rank() == 2
    }

    /// Terminal and healthy
    pub const fn is_success(self) -> bool {
        matches!(self, ResourceState::Running | ResourceState::Created)
    }

    pub const fn is_failed(self) -> bool {
        matches!(self, ResourceState::Failed)
    }

    /// Whether `self -> next` is an edge of the resource state machine.
    ///
    /// Staying in the same state is always allowed.
    pub fn can_transition_to(self, next: ResourceState) -> bool {
        use ResourceState::*;

        if self == next {
            return true;
        }
        match (self, next) {
            (Pending, Creating) => true,
            (Pending | Creating, Running | Created | Failed) => true,
            (Running | Created, Failed) => true,
            (Running, Stopped) => true,
            _ => false,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ResourceState::Pending => "pending",
            ResourceState::Creating => "creating",
            ResourceState::Running => "running",
            ResourceState::Created => "created",
            ResourceState::Stopped => "stopped",
            ResourceState::Failed => "failed",
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall status of a range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeStatus {
    /// Not deployed yet
    #[default]
    Draft,

    /// Deployment in progress
    Deploying,

    /// Every required resource is up
    Running,

    /// Stopped after deployment
    Stopped,

    /// Deployment failed
    Error,
}

impl RangeStatus {
    /// Nothing left to wait for in the current attempt
    pub const fn is_settled(self) -> bool {
        matches!(
            self,
            RangeStatus::Running | RangeStatus::Stopped | RangeStatus::Error
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            RangeStatus::Draft => "draft",
            RangeStatus::Deploying => "deploying",
            RangeStatus::Running => "running",
            RangeStatus::Stopped => "stopped",
            RangeStatus::Error => "error",
        }
    }
}

impl fmt::Display for RangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RangeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(RangeStatus::Draft),
            "deploying" => Ok(RangeStatus::Deploying),
            "running" => Ok(RangeStatus::Running),
            "stopped" => Ok(RangeStatus::Stopped),
            "error" => Ok(RangeStatus::Error),
            _ => Err(format!("Invalid range status: {}", s)),
        }
    }
}
