//! Package selection and the batched install fragment.

use indexmap::IndexMap;
use nucleus_shared::NucleusResult;
use serde::{Deserialize, Serialize};

use crate::util::shell::{quote, validate_package_name, validate_package_version};

/// Version sentinel meaning "no version pin".
pub const LATEST: &str = "latest";

/// Package → version mapping that remembers insertion order.
///
/// Keys are unique; inserting an existing key replaces its version in place.
/// Serializes as a JSON object in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageSet {
    entries: IndexMap<String, String>,
}

impl PackageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a package pin, returning the previous version.
    pub fn insert(&mut self, name: impl Into<String>, version: impl Into<String>) -> Option<String> {
        self.entries.insert(name.into(), version.into())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Check every name and version against the allow-list.
    pub fn validate(&self) -> NucleusResult<()> {
        for (name, version) in self.iter() {
            validate_package_name(name)?;
            validate_package_version(version)?;
        }
        Ok(())
    }
}

impl<K, V> FromIterator<(K, V)> for PackageSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = PackageSet::new();
        for (name, version) in iter {
            set.insert(name, version);
        }
        set
    }
}

/// Render the install argument list: bare names for `latest`, `name=version`
/// otherwise, space separated in insertion order.
pub fn build_install_set(packages: &PackageSet) -> String {
    packages
        .iter()
        .map(|(name, version)| {
            if version == LATEST {
                quote(name)
            } else {
                quote(&format!("{}={}", name, version))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
