//! Parsing of `pct status <id>` output.

use serde::Serialize;

/// Live run state reported by the hypervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    Running,
    Stopped,
    /// Anything else the hypervisor reports, verbatim.
    Unknown(String),
}

impl ContainerStatus {
    /// Parse the `status: <state>` line. Output without one is `Unknown("")`.
    pub fn parse(output: &str) -> Self {
        let state = output
            .lines()
            .find_map(|line| line.trim().strip_prefix("status:"))
            .map(str::trim)
            .unwrap_or_default();

        match state {
            "running" => ContainerStatus::Running,
            "stopped" => ContainerStatus::Stopped,
            other => ContainerStatus::Unknown(other.to_string()),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ContainerStatus::Running)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, ContainerStatus::Stopped)
    }
}
