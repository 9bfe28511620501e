//! Rendering of `pct` command lines.
//!
//! Pure functions, one per operation. Every interpolated token is quoted with
//! [`quote`]; callers validate user input before it reaches this module.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ctid::Ctid;
use super::packages::{PackageSet, build_install_set};
use crate::util::shell::quote;

/// What a rendered command does. Used for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Create,
    InstallPackages,
    Start,
    Shutdown,
    Destroy,
    List,
    Hostname,
    Status,
}

impl CommandKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Create => "create",
            CommandKind::InstallPackages => "install_packages",
            CommandKind::Start => "start",
            CommandKind::Shutdown => "shutdown",
            CommandKind::Destroy => "destroy",
            CommandKind::List => "list",
            CommandKind::Hostname => "hostname",
            CommandKind::Status => "status",
        }
    }
}

/// A command line ready to hand to an executor.
///
/// `Display` and `Debug` show the redacted form, so a command can be logged
/// or embedded in an error without leaking the generated root password.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    kind: CommandKind,
    line: String,
    redacted: Option<String>,
}

impl RemoteCommand {
    fn new(kind: CommandKind, line: String) -> Self {
        Self {
            kind,
            line,
            redacted: None,
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// The exact line to execute.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// The line with secrets masked.
    pub fn redacted(&self) -> &str {
        self.redacted.as_deref().unwrap_or(&self.line)
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.redacted())
    }
}

impl fmt::Debug for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCommand")
            .field("kind", &self.kind)
            .field("line", &self.redacted())
            .finish()
    }
}

/// Virtual network interface attached to new containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSpec {
    pub interface: String,
    pub bridge: String,
    pub kind: String,
}

impl Default for NetworkSpec {
    fn default() -> Self {
        Self {
            interface: "eth0".to_string(),
            bridge: "vmbr0".to_string(),
            kind: "veth".to_string(),
        }
    }
}

impl NetworkSpec {
    fn render(&self) -> String {
        format!(
            "name={},bridge={},type={}",
            self.interface, self.bridge, self.kind
        )
    }
}

/// Parameters of a `pct create` invocation.
#[derive(Debug, Clone)]
pub struct CreateSpec<'a> {
    pub ctid: Ctid,
    pub template: &'a str,
    pub hostname: &'a str,
    pub cores: u32,
    pub memory_mb: u32,
    pub disk_gb: u32,
    pub storage: &'a str,
    pub root_password: &'a str,
    pub network: &'a NetworkSpec,
}

/// Create an unprivileged container and start it.
pub fn create(spec: &CreateSpec<'_>) -> RemoteCommand {
    let render = |password: &str| {
        format!(
            "pct create {id} {template} -memory {memory} -cores {cores} -hostname {hostname} \
             -rootfs {rootfs} -password {password} -unprivileged 1 -net0 {net} && pct start {id}",
            id = spec.ctid,
            template = quote(spec.template),
            memory = spec.memory_mb,
            cores = spec.cores,
            hostname = quote(spec.hostname),
            rootfs = quote(&format!("{}:{}", spec.storage, spec.disk_gb)),
            password = password,
            net = quote(&spec.network.render()),
        )
    };

    RemoteCommand {
        kind: CommandKind::Create,
        line: render(&quote(spec.root_password)),
        redacted: Some(render("<redacted>")),
    }
}

/// Refresh the package index and install every selected package.
///
/// Returns `None` for an empty selection: there is nothing to install and no
/// command should be issued.
pub fn install_packages(ctid: Ctid, packages: &PackageSet) -> Option<RemoteCommand> {
    if packages.is_empty() {
        return None;
    }
    Some(RemoteCommand::new(
        CommandKind::InstallPackages,
        format!(
            "pct exec {id} -- apt update && pct exec {id} -- apt install -y {set}",
            id = ctid,
            set = build_install_set(packages),
        ),
    ))
}

pub fn start(ctid: Ctid) -> RemoteCommand {
    RemoteCommand::new(CommandKind::Start, format!("pct start {}", ctid))
}

/// Graceful shutdown.
pub fn shutdown(ctid: Ctid) -> RemoteCommand {
    RemoteCommand::new(CommandKind::Shutdown, format!("pct shutdown {}", ctid))
}

/// Destroy a container; `force` destroys it even while running.
pub fn destroy(ctid: Ctid, force: bool) -> RemoteCommand {
    let line = if force {
        format!("pct destroy {} --force 1", ctid)
    } else {
        format!("pct destroy {}", ctid)
    };
    RemoteCommand::new(CommandKind::Destroy, line)
}

pub fn list() -> RemoteCommand {
    RemoteCommand::new(CommandKind::List, "pct list".to_string())
}

/// The hypervisor node's own hostname.
pub fn hostname() -> RemoteCommand {
    RemoteCommand::new(CommandKind::Hostname, "hostname".to_string())
}

pub fn status(ctid: Ctid) -> RemoteCommand {
    RemoteCommand::new(CommandKind::Status, format!("pct status {}", ctid))
}
