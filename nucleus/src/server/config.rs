use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hypervisor::PackageSet;

/// Validated, normalized form of a server request.
///
/// Produced by `ContainerRequest::sanitize`; every field is safe to render
/// into a command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSpec {
    pub name: String,
    /// OS key as the caller supplied it, normalized to lowercase.
    pub os: String,
    /// Resolved template reference.
    pub template: String,
    pub cores: u32,
    pub memory_mb: u32,
    pub disk_gb: u32,
    #[serde(default)]
    pub packages: PackageSet,
}

/// Immutable part of a server record, written once at provision time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub spec: ServerSpec,
    /// Address of the hypervisor the server was placed on.
    pub hypervisor: String,
    pub created_at: DateTime<Utc>,
}

impl ServerConfig {
    pub fn new(spec: ServerSpec, hypervisor: impl Into<String>) -> Self {
        Self {
            name: spec.name.clone(),
            spec,
            hypervisor: hypervisor.into(),
            created_at: Utc::now(),
        }
    }
}
