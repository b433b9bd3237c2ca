//! Typed view of the merged configuration document.
//!
//! Every section has defaults matching the production sync of the
//! `whosonfirst-data-postalcode-gb` repository, so an empty config is valid.

use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub target: TargetSettings,
    pub geometry: GeometrySettings,
    pub creation: CreationSettings,
    pub pool: PoolSettings,
    pub resolver: ResolverSettings,
    pub ids: IdSettings,
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.target.country.trim().is_empty() {
            bail!("target.country must not be empty");
        }
        if self.target.placetype.trim().is_empty() {
            bail!("target.placetype must not be empty");
        }
        match self.resolver.kind {
            ResolverKind::Spatial if self.resolver.url.is_none() => {
                bail!("resolver.kind=spatial requires resolver.url")
            }
            ResolverKind::Prefix if self.resolver.regions_path.is_none() => {
                bail!("resolver.kind=prefix requires resolver.regions_path")
            }
            _ => {}
        }
        if self.resolver.connect_timeout_secs == 0 || self.resolver.request_timeout_secs == 0 {
            bail!("resolver timeouts must be positive");
        }
        Ok(())
    }
}

/// Which records the sync owns and how new ones are labelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetSettings {
    /// `wof:country` of records in scope; others are skipped.
    pub country: String,
    /// `wof:repo` stamped on created records.
    pub repo: String,
    /// `wof:placetype` stamped on created records.
    pub placetype: String,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            country: "GB".to_string(),
            repo: "whosonfirst-data-postalcode-gb".to_string(),
            placetype: "postalcode".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometrySettings {
    /// Code prefixes whose coordinates are licensed too restrictively to publish.
    pub restricted_prefixes: Vec<String>,
    /// Latitude the registry uses for "no known geometry".
    pub registry_sentinel_latitude: String,
    /// `src:geom` written when coordinates come from the registry.
    pub source_tag: String,
}

impl Default for GeometrySettings {
    fn default() -> Self {
        Self {
            // Northern Ireland.
            restricted_prefixes: vec!["BT".to_string()],
            registry_sentinel_latitude: "99.999999".to_string(),
            source_tag: "os".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreationSettings {
    /// Registry country codes never auto-created.
    pub denylist: Vec<String>,
}

impl Default for CreationSettings {
    fn default() -> Self {
        Self {
            // Channel Islands, Isle of Man.
            denylist: vec!["L93000001".to_string(), "M83000003".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Pass-one workers; 0 picks twice the available parallelism.
    pub workers: usize,
    /// Work queue depth; 0 picks twice the worker count.
    pub queue_depth: usize,
    /// Stop dispatching on the first per-record error. Off for long
    /// unattended runs that should log, count and carry on.
    pub fail_fast: bool,
    /// Pass-two workers.
    pub create_workers: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            workers: 0,
            queue_depth: 0,
            fail_fast: true,
            create_workers: 1,
        }
    }
}

impl PoolSettings {
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        cpus * 2
    }

    pub fn effective_queue_depth(&self) -> usize {
        if self.queue_depth > 0 {
            self.queue_depth
        } else {
            self.effective_workers() * 2
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverKind {
    /// Leave hierarchy properties untouched.
    #[default]
    None,
    /// Point-in-polygon HTTP service.
    Spatial,
    /// Outward-code -> postal region table.
    Prefix,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub kind: ResolverKind,
    pub url: Option<String>,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Candidate placetypes accepted as a parent, in no particular order.
    pub allowed_placetypes: Vec<String>,
    pub regions_path: Option<PathBuf>,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            kind: ResolverKind::None,
            url: None,
            connect_timeout_secs: 30,
            idle_timeout_secs: 90,
            request_timeout_secs: 60,
            allowed_placetypes: ["locality", "localadmin", "county", "region"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            regions_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdSettings {
    /// New identifiers are always greater than this.
    pub floor: i64,
}
