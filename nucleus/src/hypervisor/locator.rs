//! Logical name → CTID resolution.
//!
//! The hypervisor listing is fetched once and filtered here, locally.
//!
//! Name matching is by substring over whole listing lines, first line wins.
//! This is ambiguous when one name is a substring of another (`app-server`
//! also matches `app-server-backup`); the first line the hypervisor returns
//! is taken and a warning is logged. The match also covers the status and
//! lock columns, so a server named `running` or `stopped` matches the first
//! container in that state, whatever its name. The identity record written
//! at create time is consulted first so that both hazards only matter for
//! servers without a record.

use serde::Serialize;

use super::ctid::Ctid;

/// How a container was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocateSource {
    /// The recorded CTID was confirmed by the listing.
    IdentityRecord,
    /// Substring match on the listing.
    NameMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    pub ctid: Ctid,
    pub source: LocateSource,
}

/// Substring search over `listing` for `name`.
///
/// Takes the first line containing `name`; the CTID is that line's first
/// whitespace-delimited token and must be purely numeric.
pub fn locate(listing: &str, name: &str) -> Option<Ctid> {
    if name.is_empty() {
        return None;
    }

    let mut matches = listing.lines().filter(|line| line.contains(name));
    let first = matches.next()?;
    let others = matches.count();
    if others > 0 {
        tracing::warn!(
            server = %name,
            extra_matches = others,
            "Ambiguous name match in container listing, using first line"
        );
    }

    first_token_ctid(first)
}

/// Resolve `name`, preferring a recorded CTID when the listing confirms it.
///
/// A record is confirmed when some line starts with the CTID and carries
/// `name` as a whole token. Otherwise falls back to [`locate`].
pub fn resolve(listing: &str, name: &str, recorded: Option<Ctid>) -> Option<Located> {
    if let Some(ctid) = recorded {
        if record_confirmed(listing, name, ctid) {
            return Some(Located {
                ctid,
                source: LocateSource::IdentityRecord,
            });
        }
        tracing::warn!(
            server = %name,
            ctid = %ctid,
            "Identity record not confirmed by listing, falling back to name match"
        );
    }

    locate(listing, name).map(|ctid| Located {
        ctid,
        source: LocateSource::NameMatch,
    })
}

fn record_confirmed(listing: &str, name: &str, ctid: Ctid) -> bool {
    listing.lines().any(|line| {
        let mut tokens = line.split_whitespace();
        tokens.next().and_then(|t| t.parse::<Ctid>().ok()) == Some(ctid)
            && tokens.any(|t| t == name)
    })
}

fn first_token_ctid(line: &str) -> Option<Ctid> {
    line.split_whitespace().next()?.parse().ok()
}
