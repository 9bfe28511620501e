//! Values returned by runtime operations.

use chrono::{DateTime, Utc};
use nucleus_shared::NucleusError;
use serde::Serialize;

use crate::hypervisor::{ContainerStatus, Ctid, LocateSource, PackageSet};
use crate::pipeline::PipelineMetrics;
use crate::server::{LifecycleState, ServerConfig, ServerState};

/// Flattened view of a server record.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub os: String,
    pub template: String,
    pub cores: u32,
    pub memory_mb: u32,
    pub disk_gb: u32,
    pub packages: PackageSet,
    pub hypervisor: String,
    pub status: LifecycleState,
    pub ctid: Option<Ctid>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServerInfo {
    pub fn new(config: &ServerConfig, state: &ServerState) -> Self {
        let spec = &config.spec;
        Self {
            name: config.name.clone(),
            os: spec.os.clone(),
            template: spec.template.clone(),
            cores: spec.cores,
            memory_mb: spec.memory_mb,
            disk_gb: spec.disk_gb,
            packages: spec.packages.clone(),
            hypervisor: config.hypervisor.clone(),
            status: state.status,
            ctid: state.ctid,
            last_error: state.last_error.clone(),
            created_at: config.created_at,
            updated_at: state.updated_at,
        }
    }
}

/// Recorded and live view of one server.
#[derive(Debug, Clone, Serialize)]
pub struct ServerReport {
    pub name: String,
    /// `None` for containers with no record in the store.
    pub record: Option<ServerInfo>,
    /// `None` when the hypervisor listing has no matching container.
    pub ctid: Option<Ctid>,
    pub located_by: Option<LocateSource>,
    pub live_status: Option<ContainerStatus>,
}

/// Result of the package step of a provision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PackageInstall {
    /// No packages were requested.
    Skipped,
    Installed { count: usize },
    Failed { message: String },
}

/// What a provision produced.
///
/// A provision whose container came up but whose package installation failed
/// still returns an outcome: the container exists and the caller needs its
/// identifiers. [`ProvisionOutcome::partial_failure`] turns that case into
/// the corresponding error.
#[derive(Clone, Serialize)]
pub struct ProvisionOutcome {
    pub name: String,
    pub ctid: Ctid,
    pub template: String,
    pub hypervisor: String,
    /// Generated root password. Returned once and never persisted or logged.
    pub root_password: String,
    pub packages: PackageInstall,
    pub status: LifecycleState,
    pub metrics: PipelineMetrics,
}

impl ProvisionOutcome {
    pub fn partial_failure(&self) -> Option<NucleusError> {
        match &self.packages {
            PackageInstall::Failed { message } => Some(NucleusError::PartialProvision {
                name: self.name.clone(),
                ctid: self.ctid.get(),
                message: message.clone(),
            }),
            _ => None,
        }
    }
}

impl std::fmt::Debug for ProvisionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionOutcome")
            .field("name", &self.name)
            .field("ctid", &self.ctid)
            .field("template", &self.template)
            .field("hypervisor", &self.hypervisor)
            .field("root_password", &"<redacted>")
            .field("packages", &self.packages)
            .field("status", &self.status)
            .finish()
    }
}

/// Result of start and shutdown.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleOutcome {
    pub name: String,
    pub ctid: Ctid,
    pub status: LifecycleState,
    pub located_by: LocateSource,
    /// False when the container has no record in the store.
    pub recorded: bool,
}

/// Result of delete.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    pub name: String,
    /// `None` when no container was found and only the record was removed.
    pub ctid: Option<Ctid>,
    pub record_removed: bool,
    /// Graceful shutdown error that was ignored before the forced destroy.
    pub shutdown_error: Option<String>,
}
