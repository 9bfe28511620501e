//! Recorded lifecycle state of a server.
//!
//! The store keeps the last state the orchestrator observed. Live truth comes
//! from the hypervisor on every operation, so the recorded state is advisory.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hypervisor::Ctid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Record persisted, nothing issued to the hypervisor yet.
    Requested,
    /// Create command issued.
    Provisioning,
    Running,
    ShuttingDown,
    Stopped,
    Destroying,
    Destroyed,
    Failed,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Requested => "requested",
            LifecycleState::Provisioning => "provisioning",
            LifecycleState::Running => "running",
            LifecycleState::ShuttingDown => "shutting_down",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Destroying => "destroying",
            LifecycleState::Destroyed => "destroyed",
            LifecycleState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Destroyed | LifecycleState::Failed)
    }

    /// Whether `self → next` is a legal recorded transition.
    ///
    /// `Failed` is terminal for provisioning, but a failed server can still
    /// be started, stopped, or destroyed once the hypervisor confirms the
    /// container exists.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;

        if next == Failed {
            return !self.is_terminal();
        }

        match self {
            Requested => next == Provisioning,
            Provisioning => next == Running,
            Running => matches!(next, Running | ShuttingDown | Destroying),
            ShuttingDown => matches!(next, Stopped | Destroying),
            Stopped => matches!(next, Running | ShuttingDown | Destroying),
            Destroying => next == Destroyed,
            Failed => matches!(next, Running | ShuttingDown | Destroying),
            Destroyed => false,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LifecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "requested" => LifecycleState::Requested,
            "provisioning" => LifecycleState::Provisioning,
            "running" => LifecycleState::Running,
            "shutting_down" => LifecycleState::ShuttingDown,
            "stopped" => LifecycleState::Stopped,
            "destroying" => LifecycleState::Destroying,
            "destroyed" => LifecycleState::Destroyed,
            "failed" => LifecycleState::Failed,
            other => return Err(format!("unknown lifecycle state '{}'", other)),
        })
    }
}

/// Mutable part of a server record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerState {
    pub status: LifecycleState,
    /// Identity record: the CTID issued at create time.
    pub ctid: Option<Ctid>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            status: LifecycleState::Requested,
            ctid: None,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn set_status(&mut self, status: LifecycleState) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn set_ctid(&mut self, ctid: Ctid) {
        self.ctid = Some(ctid);
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = LifecycleState::Failed;
        self.last_error = Some(message.into());
        self.updated_at = Utc::now();
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}
