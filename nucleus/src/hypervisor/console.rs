//! Web console URL composition.

use nucleus_shared::{NucleusError, NucleusResult};
use serde::Serialize;
use url::Url;

use super::ctid::Ctid;

/// Everything a caller needs to open a browser console for a server.
#[derive(Debug, Clone, Serialize)]
pub struct ConsoleAccess {
    pub name: String,
    pub ctid: Ctid,
    /// Node name used in the URL.
    pub node: String,
    /// False when the node hostname lookup failed and the hypervisor
    /// address was used instead.
    pub node_resolved: bool,
    pub url: String,
}

/// Build `https://<address>:<port>/?console=lxc&xtermjs=1&vmid=..&vmname=..&node=..&cmd=`.
///
/// Query values are percent-encoded. IPv6 literals are bracketed.
pub fn console_url(
    address: &str,
    port: u16,
    ctid: Ctid,
    name: &str,
    node: &str,
) -> NucleusResult<Url> {
    let host = if address.contains(':') && !address.starts_with('[') {
        format!("[{}]", address)
    } else {
        address.to_string()
    };

    let mut url = Url::parse(&format!("https://{}:{}/", host, port))
        .map_err(|e| NucleusError::Config(format!("invalid console address '{}': {}", address, e)))?;

    url.query_pairs_mut()
        .append_pair("console", "lxc")
        .append_pair("xtermjs", "1")
        .append_pair("vmid", &ctid.to_string())
        .append_pair("vmname", name)
        .append_pair("node", node)
        .append_pair("cmd", "");

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_url_shape() {
        let url = console_url("192.168.1.100", 8006, Ctid::new(101), "app-server", "pve1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://192.168.1.100:8006/?console=lxc&xtermjs=1&vmid=101&vmname=app-server&node=pve1&cmd="
        );
    }

    #[test]
    fn test_console_url_encodes_values() {
        let url = console_url("pve.lan", 8006, Ctid::new(7), "a b", "node&x").unwrap();
        assert!(url.as_str().contains("vmname=a+b"));
        assert!(url.as_str().contains("node=node%26x"));
    }

    #[test]
    fn test_console_url_ipv6() {
        let url = console_url("fd00::5", 8006, Ctid::new(101), "web", "fd00::5").unwrap();
        assert!(url.as_str().starts_with("https://[fd00::5]:8006/"));
    }

    #[test]
    fn test_console_url_rejects_garbage() {
        assert!(console_url("bad host", 8006, Ctid::new(1), "web", "n").is_err());
    }
}
