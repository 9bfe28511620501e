//! Container identifiers (CTIDs) and their allocation.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Lowest identifier handed out by [`RandomCtidAllocator`].
pub const CTID_MIN: u32 = 100;
/// Highest identifier handed out by [`RandomCtidAllocator`].
pub const CTID_MAX: u32 = 999;

/// The hypervisor's numeric handle for a container instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ctid(u32);

impl Ctid {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Ctid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a container id")]
pub struct ParseCtidError(String);

impl FromStr for Ctid {
    type Err = ParseCtidError;

    /// Parses a purely numeric token. Signs and whitespace are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseCtidError(s.to_string()));
        }
        s.parse().map(Ctid).map_err(|_| ParseCtidError(s.to_string()))
    }
}

impl From<Ctid> for u32 {
    fn from(ctid: Ctid) -> Self {
        ctid.0
    }
}

/// Produces candidate identifiers for new containers.
///
/// Allocation is advisory: no collision check is made against the
/// hypervisor, which rejects the create command if the identifier is taken.
pub trait CtidAllocator: Send + Sync {
    fn allocate(&self) -> Ctid;
}

/// Uniform random draw from `[CTID_MIN, CTID_MAX]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCtidAllocator;

impl CtidAllocator for RandomCtidAllocator {
    fn allocate(&self) -> Ctid {
        Ctid(rand::rng().random_range(CTID_MIN..=CTID_MAX))
    }
}

/// Hands out a fixed identifier. Test-only.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct FixedCtidAllocator(pub u32);

#[cfg(test)]
impl CtidAllocator for FixedCtidAllocator {
    fn allocate(&self) -> Ctid {
        Ctid(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_allocation_in_range() {
        let allocator = RandomCtidAllocator;
        for _ in 0..1000 {
            let id = allocator.allocate().get();
            assert!((CTID_MIN..=CTID_MAX).contains(&id), "out of range: {}", id);
        }
    }

    #[test]
    fn test_parse_numeric_only() {
        assert_eq!("101".parse::<Ctid>().unwrap(), Ctid::new(101));
        assert!("VMID".parse::<Ctid>().is_err());
        assert!("+101".parse::<Ctid>().is_err());
        assert!("".parse::<Ctid>().is_err());
        assert!("99999999999".parse::<Ctid>().is_err());
    }
}
