//! Runtime configuration and server requests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nucleus_shared::{NucleusError, NucleusResult};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::hypervisor::{HypervisorTarget, NetworkSpec, PackageSet, TemplateCatalog};
use crate::server::ServerSpec;
use crate::util::shell::{validate_config_token, validate_hostname};

/// Environment variable overriding the default home directory.
pub const HOME_ENV: &str = "NUCLEUS_HOME";

fn default_home_dir() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_ENV) {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".nucleus")
}

/// Runtime configuration, usually loaded from a JSON file.
///
/// Every field has a default, so `{}` is a valid (if hypervisor-less)
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NucleusOptions {
    pub home_dir: PathBuf,
    /// Registered hypervisors. Only the first is used.
    pub hypervisors: Vec<HypervisorTarget>,
    pub executor: ExecutorOptions,
    /// Extra OS key → template reference entries.
    pub templates: BTreeMap<String, String>,
    pub network: NetworkSpec,
    /// Storage pool for root filesystems.
    pub rootfs_storage: String,
    /// Web console port, used when the hypervisor address carries none.
    pub console_port: u16,
    /// Polling after create, until the container reports running.
    pub boot_wait: WaitOptions,
    /// Polling after a graceful shutdown during delete.
    pub shutdown_wait: WaitOptions,
    /// Mirror log events to stderr.
    pub log_to_stderr: bool,
}

impl Default for NucleusOptions {
    fn default() -> Self {
        Self {
            home_dir: default_home_dir(),
            hypervisors: Vec::new(),
            executor: ExecutorOptions::default(),
            templates: BTreeMap::new(),
            network: NetworkSpec::default(),
            rootfs_storage: "local-lvm".to_string(),
            console_port: 8006,
            boot_wait: WaitOptions::boot(),
            shutdown_wait: WaitOptions::shutdown(),
            log_to_stderr: false,
        }
    }
}

impl NucleusOptions {
    pub fn from_file(path: &Path) -> NucleusResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            NucleusError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| NucleusError::Config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Check values that end up on command lines or drive timing.
    pub fn sanitize(&self) -> NucleusResult<()> {
        if !self.home_dir.is_absolute() {
            return Err(NucleusError::Config(format!(
                "home_dir must be an absolute path, got {}",
                self.home_dir.display()
            )));
        }

        validate_config_token("rootfs storage", &self.rootfs_storage)?;
        validate_config_token("network interface", &self.network.interface)?;
        validate_config_token("network bridge", &self.network.bridge)?;
        validate_config_token("network type", &self.network.kind)?;

        if self.console_port == 0 {
            return Err(NucleusError::Config("console_port must be non-zero".into()));
        }

        self.boot_wait.validate("boot_wait")?;
        self.shutdown_wait.validate("shutdown_wait")?;
        Ok(())
    }
}

/// Which remote execution adapter to use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutorOptions {
    /// HTTP remote-execution service.
    Http {
        #[serde(default = "default_http_endpoint")]
        endpoint: String,
        #[serde(default = "default_http_timeout")]
        timeout_secs: u64,
    },
    /// Local OpenSSH client with key-based authentication.
    Ssh {
        #[serde(default = "default_ssh_binary")]
        binary: String,
        #[serde(default = "default_connect_timeout")]
        connect_timeout_secs: u64,
    },
}

fn default_http_endpoint() -> String {
    "http://localhost:7789".to_string()
}

fn default_http_timeout() -> u64 {
    300
}

fn default_ssh_binary() -> String {
    "ssh".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        ExecutorOptions::Http {
            endpoint: default_http_endpoint(),
            timeout_secs: default_http_timeout(),
        }
    }
}

/// Bounded polling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitOptions {
    pub poll_interval_ms: u64,
    pub timeout_ms: u64,
}

impl WaitOptions {
    pub fn boot() -> Self {
        Self {
            poll_interval_ms: 1_000,
            timeout_ms: 60_000,
        }
    }

    pub fn shutdown() -> Self {
        Self {
            poll_interval_ms: 1_000,
            timeout_ms: 30_000,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn validate(&self, what: &str) -> NucleusResult<()> {
        if self.poll_interval_ms == 0 || self.timeout_ms == 0 {
            return Err(NucleusError::Config(format!(
                "{}: poll_interval_ms and timeout_ms must be positive",
                what
            )));
        }
        Ok(())
    }
}

/// A caller's declarative request for a new server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerRequest {
    /// Logical name. A name is generated when blank.
    #[serde(default)]
    pub name: String,
    pub os: String,
    pub cores: Option<u32>,
    pub memory_mb: Option<u32>,
    pub disk_gb: Option<u32>,
    #[serde(default)]
    pub packages: PackageSet,
}

impl ContainerRequest {
    pub fn new(name: impl Into<String>, os: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            os: os.into(),
            ..Default::default()
        }
    }

    pub fn with_resources(mut self, cores: u32, memory_mb: u32, disk_gb: u32) -> Self {
        self.cores = Some(cores);
        self.memory_mb = Some(memory_mb);
        self.disk_gb = Some(disk_gb);
        self
    }

    pub fn with_package(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.packages.insert(name, version);
        self
    }

    /// Validate the request and resolve its template.
    ///
    /// Raises `Validation` or `UnsupportedTemplate` before anything is
    /// persisted or executed.
    pub fn sanitize(&self, templates: &TemplateCatalog) -> NucleusResult<ServerSpec> {
        let name = match self.name.trim() {
            "" => generate_name(),
            trimmed => trimmed.to_string(),
        };
        validate_hostname(&name)?;

        let os = self.os.trim().to_ascii_lowercase();
        if os.is_empty() {
            return Err(NucleusError::Validation("os template is required".into()));
        }
        let cores = require_positive("cores", self.cores)?;
        let memory_mb = require_positive("memory_mb", self.memory_mb)?;
        let disk_gb = require_positive("disk_gb", self.disk_gb)?;
        self.packages.validate()?;

        let template = templates.resolve(&os)?.to_string();

        Ok(ServerSpec {
            name,
            os,
            template,
            cores,
            memory_mb,
            disk_gb,
            packages: self.packages.clone(),
        })
    }
}

fn require_positive(field: &str, value: Option<u32>) -> NucleusResult<u32> {
    match value {
        Some(v) if v > 0 => Ok(v),
        Some(_) => Err(NucleusError::Validation(format!("{} must be positive", field))),
        None => Err(NucleusError::Validation(format!("{} is required", field))),
    }
}

/// `server-` followed by six random hex digits.
fn generate_name() -> String {
    format!("server-{:06x}", rand::rng().random_range(0..0x100_0000u32))
}
