//! Hypervisor-facing building blocks.
//!
//! Everything here is either pure (command rendering, listing parsing,
//! console URLs) or a narrow collaborator boundary (inventory). The
//! orchestration that strings these together lives in `crate::server`.
//!
//! - `command`: `pct` command-line rendering
//! - `template`: OS key → template reference
//! - `ctid`: container identifiers and allocation
//! - `packages`: ordered package/version mapping and install fragment
//! - `locator`: logical name → CTID resolution from a listing
//! - `status`: `pct status` parsing
//! - `console`: console URL composition
//! - `inventory`: hypervisor inventory

pub mod command;
pub mod console;
pub mod ctid;
pub mod inventory;
pub mod locator;
pub mod packages;
pub mod status;
pub mod template;

pub use command::{CommandKind, CreateSpec, NetworkSpec, RemoteCommand};
pub use console::ConsoleAccess;
pub use ctid::{Ctid, CtidAllocator, RandomCtidAllocator};
pub use inventory::{HypervisorInventory, StaticInventory};
pub use locator::{LocateSource, Located};
pub use packages::{LATEST, PackageSet, build_install_set};
pub use status::ContainerStatus;
pub use template::TemplateCatalog;

use serde::{Deserialize, Serialize};
use url::Url;

fn default_ssh_port() -> u16 {
    22
}

/// Connection descriptor for one hypervisor.
///
/// `address` is whatever the operator registered: a bare IP or hostname, a
/// `host:port` pair, or the web API URL (`https://10.0.0.5:8006`). The SSH
/// endpoint is derived from it with the scheme and port stripped.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HypervisorTarget {
    pub address: String,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    pub username: String,
    #[serde(default)]
    pub secret: String,
}

impl HypervisorTarget {
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            ssh_port: default_ssh_port(),
            username: username.into(),
            secret: secret.into(),
        }
    }

    pub fn with_ssh_port(mut self, port: u16) -> Self {
        self.ssh_port = port;
        self
    }

    /// Host to use for the SSH management channel.
    pub fn ssh_host(&self) -> String {
        let raw = self.address.trim();

        if raw.contains("://")
            && let Ok(url) = Url::parse(raw)
            && let Some(host) = url.host_str()
        {
            return host.trim_start_matches('[').trim_end_matches(']').to_string();
        }

        split_port(raw).0.to_string()
    }

    /// Port of the web API when the address carries one explicitly.
    pub fn api_port(&self) -> Option<u16> {
        let raw = self.address.trim();
        if raw.contains("://") {
            return Url::parse(raw).ok().and_then(|url| url.port());
        }
        split_port(raw).1.and_then(|port| port.parse().ok())
    }
}

/// Split `host:port` or `[v6]:port` into host and optional port.
fn split_port(raw: &str) -> (&str, Option<&str>) {
    if let Some(rest) = raw.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((host, tail)) => (host, tail.strip_prefix(':')),
            None => (rest, None),
        };
    }
    match raw.split_once(':') {
        // A second colon means a bare IPv6 address; leave it alone.
        Some((host, port)) if !port.contains(':') => (host, Some(port)),
        _ => (raw, None),
    }
}

impl std::fmt::Debug for HypervisorTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HypervisorTarget")
            .field("address", &self.address)
            .field("ssh_port", &self.ssh_port)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssh_host_from_api_url() {
        let target = HypervisorTarget::new("https://192.168.1.100:8006", "root", "pw");
        assert_eq!(target.ssh_host(), "192.168.1.100");
        assert_eq!(target.api_port(), Some(8006));
        assert_eq!(target.ssh_port, 22);
    }

    #[test]
    fn test_ssh_host_variants() {
        assert_eq!(HypervisorTarget::new("10.0.0.5", "root", "").ssh_host(), "10.0.0.5");
        assert_eq!(HypervisorTarget::new("pve.lan:8006", "root", "").ssh_host(), "pve.lan");
        assert_eq!(HypervisorTarget::new("pve.lan:9006", "root", "").api_port(), Some(9006));
        assert_eq!(HypervisorTarget::new("[fd00::5]:9006", "root", "").api_port(), Some(9006));
        assert_eq!(HypervisorTarget::new("fd00::5", "root", "").api_port(), None);
        assert_eq!(HypervisorTarget::new("10.0.0.5", "root", "").api_port(), None);
        assert_eq!(HypervisorTarget::new(" pve.lan ", "root", "").ssh_host(), "pve.lan");
        assert_eq!(HypervisorTarget::new("[fd00::5]:8006", "root", "").ssh_host(), "fd00::5");
        assert_eq!(HypervisorTarget::new("fd00::5", "root", "").ssh_host(), "fd00::5");
        assert_eq!(
            HypervisorTarget::new("https://[fd00::5]:8006", "root", "").ssh_host(),
            "fd00::5"
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let target = HypervisorTarget::new("10.0.0.5", "root", "hunter2");
        let rendered = format!("{:?}", target);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_deserialize_defaults_ssh_port() {
        let target: HypervisorTarget =
            serde_json::from_str(r#"{"address":"10.0.0.5","username":"root","secret":"x"}"#)
                .unwrap();
        assert_eq!(target.ssh_port, 22);
    }
}
