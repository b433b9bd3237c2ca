use std::collections::BTreeSet;

use pcs_config::CreationSettings;
use pcs_registry::RegistryTable;
use pcs_schemas::RegistryRecord;

/// Decides whether an unseen registry entry may become a new record.
pub trait CreationPolicy: Send + Sync {
    fn allows(&self, entry: &RegistryRecord) -> bool;
}

/// Refuses entries whose country classification code is listed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DenylistPolicy {
    denied: BTreeSet<String>,
}

impl DenylistPolicy {
    pub fn new(codes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            denied: codes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_settings(settings: &CreationSettings) -> Self {
        Self::new(settings.denylist.iter().cloned())
    }

    pub fn denied(&self) -> &BTreeSet<String> {
        &self.denied
    }

    /// Listed codes that never occur in `registry`; usually a typo in config.
    pub fn unknown_codes<'a>(&'a self, registry: &RegistryTable) -> Vec<&'a str> {
        let present = registry.country_codes();
        self.denied
            .iter()
            .map(String::as_str)
            .filter(|c| !present.contains(c))
            .collect()
    }
}

impl CreationPolicy for DenylistPolicy {
    fn allows(&self, entry: &RegistryRecord) -> bool {
        !self.denied.contains(&entry.country_code)
    }
}
