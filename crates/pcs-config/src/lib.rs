//! pcs-config
//!
//! Layered YAML configuration for the postcode sync.
//!
//! Documents are merged in order (earlier = base, later = override), rendered
//! to canonical JSON and hashed so every run can report exactly which settings
//! it used. The typed view lives in [`settings`].

pub mod settings;

pub use settings::{
    CreationSettings, GeometrySettings, IdSettings, PoolSettings, ResolverKind,
    ResolverSettings, SyncConfig, TargetSettings,
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

/// JSON-pointer prefixes read by the sync. A leaf outside all of them is
/// reported as unused (usually a typo that would otherwise be ignored silently).
pub const CONSUMED_POINTERS: &[&str] = &[
    "/target/country",
    "/target/repo",
    "/target/placetype",
    "/geometry/restricted_prefixes",
    "/geometry/registry_sentinel_latitude",
    "/geometry/source_tag",
    "/creation/denylist",
    "/pool/workers",
    "/pool/queue_depth",
    "/pool/fail_fast",
    "/pool/create_workers",
    "/resolver/kind",
    "/resolver/url",
    "/resolver/connect_timeout_secs",
    "/resolver/idle_timeout_secs",
    "/resolver/request_timeout_secs",
    "/resolver/allowed_placetypes",
    "/resolver/regions_path",
    "/ids/floor",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Minimal set of unused leaf pointers (sorted)
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Report the leaves of a merged config document that no setting reads.
/// Under [`UnusedKeyPolicy::Fail`] any such key is an error, so a misspelt
/// override cannot be silently ignored.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let mut leaves = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|leaf| !CONSUMED_POINTERS.iter().any(|setting| reads(setting, leaf)))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        unused_leaf_pointers: unused,
    };
    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "config has {} key(s) the sync does not read: {}",
            report.unused_leaf_pointers.len(),
            report.unused_leaf_pointers.join(", ")
        );
    }
    Ok(report)
}

/// A setting at `/pool/workers` reads that leaf and anything below it
/// (list items of `/creation/denylist`), never `/pool/workers_max`.
fn reads(setting: &str, leaf: &str) -> bool {
    match leaf.strip_prefix(setting) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// JSON pointers to every scalar leaf; empty maps and lists count as leaves.
fn collect_leaf_pointers(v: &Value, at: &str, out: &mut Vec<String>) {
    let children: Vec<(String, &Value)> = match v {
        Value::Object(map) => map
            .iter()
            .map(|(k, child)| (k.replace('~', "~0").replace('/', "~1"), child))
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, child)| (i.to_string(), child))
            .collect(),
        _ => Vec::new(),
    };
    if children.is_empty() {
        if !at.is_empty() {
            out.push(at.to_string());
        }
        return;
    }
    for (token, child) in children {
        collect_leaf_pointers(child, &format!("{at}/{token}"), out);
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Typed view of the merged document; absent keys take their defaults.
    pub fn settings(&self) -> Result<SyncConfig> {
        self.settings_with(|_| {})
    }

    /// Like [`LoadedConfig::settings`], with `overlay` applied (command-line
    /// overrides) before validation.
    pub fn settings_with(&self, overlay: impl FnOnce(&mut SyncConfig)) -> Result<SyncConfig> {
        let mut cfg: SyncConfig = serde_json::from_value(self.config_json.clone())
            .context("config does not match the sync settings schema")?;
        overlay(&mut cfg);
        cfg.validate()?;
        Ok(cfg)
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        // An empty document parses as null; treat it as "no overrides".
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    if !merged.is_object() {
        bail!("config root must be a mapping");
    }

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn canonicalize_json(v: &Value) -> Result<String> {
    // serde_json::Map is a BTreeMap here (no preserve_order), so keys serialize sorted.
    serde_json::to_string(v).context("canonical json serialize failed")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
