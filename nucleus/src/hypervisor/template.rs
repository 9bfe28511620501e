//! OS key → hypervisor template reference.

use std::collections::BTreeMap;

use nucleus_shared::{NucleusError, NucleusResult};

use crate::util::shell::validate_config_token;

/// Templates available out of the box.
const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("ubuntu", "local:vztmpl/ubuntu-22.04-standard_22.04-1_amd64.tar.zst"),
    ("debian", "local:vztmpl/debian-12-standard_12.7-1_amd64.tar.zst"),
];

/// Fixed mapping of supported OS keys to template locators.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    entries: BTreeMap<String, String>,
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self {
            entries: BUILTIN_TEMPLATES
                .iter()
                .map(|(key, reference)| (key.to_string(), reference.to_string()))
                .collect(),
        }
    }
}

impl TemplateCatalog {
    /// Built-in templates plus operator-provided ones (which win on conflict).
    pub fn with_extra(extra: &BTreeMap<String, String>) -> NucleusResult<Self> {
        let mut catalog = Self::default();
        for (key, reference) in extra {
            validate_config_token("template key", key)?;
            validate_config_token("template reference", reference)?;
            catalog.entries.insert(normalize(key), reference.clone());
        }
        Ok(catalog)
    }

    /// Resolve an OS key. Keys are matched case-insensitively.
    pub fn resolve(&self, os_key: &str) -> NucleusResult<&str> {
        self.entries
            .get(&normalize(os_key))
            .map(String::as_str)
            .ok_or_else(|| NucleusError::UnsupportedTemplate(os_key.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_ascii_lowercase()
}
