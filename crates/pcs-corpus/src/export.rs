//! Change-only export of enriched records.
//!
//! The candidate is normalised to the stored canonical form and compared with
//! the bytes already on disk. Nothing is touched unless they differ, so a
//! re-run over an up to date corpus is a no-op.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::ids::IdMinter;
use crate::uri::id_to_abs_path;

const LASTMODIFIED: &str = "wof:lastmodified";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("record has no resolvable identifier")]
    MissingId,
    #[error("cannot mint identifier: {0}")]
    Mint(String),
    #[error("cannot serialise record {id}: {source}")]
    Serialize {
        id: i64,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot read stored record '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write record '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub id: i64,
    pub path: PathBuf,
    /// Canonical form differs from what is stored (or nothing is stored).
    pub changed: bool,
    /// Bytes were persisted. Always false in dry-run mode.
    pub written: bool,
}

#[derive(Clone)]
pub struct Exporter {
    root: PathBuf,
    dry_run: bool,
    minter: Option<Arc<dyn IdMinter>>,
    fixed_now: Option<i64>,
}

impl std::fmt::Debug for Exporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter")
            .field("root", &self.root)
            .field("dry_run", &self.dry_run)
            .field("mints_ids", &self.minter.is_some())
            .finish()
    }
}

impl Exporter {
    pub fn new(root: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            root: root.into(),
            dry_run,
            minter: None,
            fixed_now: None,
        }
    }

    /// Records without an identifier get one from `minter` instead of failing.
    pub fn with_minter(mut self, minter: Arc<dyn IdMinter>) -> Self {
        self.minter = Some(minter);
        self
    }

    /// Pin `wof:lastmodified` for reproducible output.
    pub fn with_fixed_clock(mut self, epoch_secs: i64) -> Self {
        self.fixed_now = Some(epoch_secs);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Normalise `candidate`, compare with `original` (or the file already at
    /// the identifier's path when `original` is `None`) and persist on change.
    pub fn export_if_changed(
        &self,
        candidate: Value,
        original: Option<&[u8]>,
    ) -> Result<ExportOutcome, ExportError> {
        let mut doc = candidate;
        let id = self.resolve_id(&doc)?;
        let path = id_to_abs_path(&self.root, id).ok_or(ExportError::MissingId)?;
        normalise(&mut doc, id);

        let stored = match original {
            Some(bytes) => Some(bytes.to_vec()),
            None => read_if_exists(&path)?,
        };

        if let Some(stored) = stored.as_deref() {
            let stamp = serde_json::from_slice::<Value>(stored)
                .ok()
                .and_then(|v| v.get("properties")?.get(LASTMODIFIED).cloned());
            set_lastmodified(&mut doc, stamp);
            let rendered = canonical_bytes(&doc).map_err(|source| ExportError::Serialize { id, source })?;
            if rendered == stored {
                debug!(id, path = %path.display(), "record unchanged");
                return Ok(ExportOutcome {
                    id,
                    path,
                    changed: false,
                    written: false,
                });
            }
        }

        set_lastmodified(&mut doc, Some(Value::from(self.now())));
        let bytes = canonical_bytes(&doc).map_err(|source| ExportError::Serialize { id, source })?;

        if self.dry_run {
            debug!(id, path = %path.display(), "dry run: record would change");
            return Ok(ExportOutcome {
                id,
                path,
                changed: true,
                written: false,
            });
        }

        write_atomic(&path, &bytes)?;
        debug!(id, path = %path.display(), bytes = bytes.len(), "record written");
        Ok(ExportOutcome {
            id,
            path,
            changed: true,
            written: true,
        })
    }

    fn resolve_id(&self, doc: &Value) -> Result<i64, ExportError> {
        let top = doc.get("id");
        let prop = doc.get("properties").and_then(|p| p.get("wof:id"));
        match top.or(prop) {
            Some(v) => v.as_i64().filter(|id| *id >= 0).ok_or(ExportError::MissingId),
            None => match &self.minter {
                Some(minter) => self.mint_unused(minter.as_ref()),
                None => Err(ExportError::MissingId),
            },
        }
    }

    /// A minted identifier never lands on a file that is already stored,
    /// even one pass one could not parse.
    fn mint_unused(&self, minter: &dyn IdMinter) -> Result<i64, ExportError> {
        loop {
            let id = minter.mint()?;
            match id_to_abs_path(&self.root, id) {
                Some(path) if path.exists() => {
                    debug!(id, path = %path.display(), "minted identifier already stored, skipping");
                }
                Some(_) => return Ok(id),
                None => return Err(ExportError::MissingId),
            }
        }
    }

    fn now(&self) -> i64 {
        self.fixed_now
            .unwrap_or_else(|| chrono::Utc::now().timestamp())
    }
}

/// Pretty JSON, keys sorted at every level, trailing newline.
pub fn canonical_bytes(doc: &Value) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = serde_json::to_vec_pretty(&sorted(doc.clone()))?;
    out.push(b'\n');
    Ok(out)
}

fn sorted(v: Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sorted(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sorted).collect()),
        other => other,
    }
}

fn normalise(doc: &mut Value, id: i64) {
    if !doc.is_object() {
        *doc = Value::Object(Map::new());
    }
    let Some(obj) = doc.as_object_mut() else {
        return;
    };
    obj.insert("id".to_string(), Value::from(id));
    let props = obj
        .entry("properties")
        .or_insert_with(|| Value::Object(Map::new()));
    if !props.is_object() {
        *props = Value::Object(Map::new());
    }
    if let Some(props) = props.as_object_mut() {
        props.insert("wof:id".to_string(), Value::from(id));
        let belongs = belongs_to(props.get("wof:hierarchy"), id);
        props.insert("wof:belongsto".to_string(), Value::from(belongs));
    }
}

fn belongs_to(hierarchy: Option<&Value>, self_id: i64) -> Vec<i64> {
    let mut ids = BTreeSet::new();
    for chain in hierarchy.and_then(Value::as_array).into_iter().flatten() {
        for v in chain.as_object().into_iter().flat_map(|m| m.values()) {
            if let Some(id) = v.as_i64() {
                if id >= 0 && id != self_id {
                    ids.insert(id);
                }
            }
        }
    }
    ids.into_iter().collect()
}

fn set_lastmodified(doc: &mut Value, stamp: Option<Value>) {
    let Some(props) = doc.get_mut("properties").and_then(Value::as_object_mut) else {
        return;
    };
    match stamp {
        Some(v) => {
            props.insert(LASTMODIFIED.to_string(), v);
        }
        None => {
            props.remove(LASTMODIFIED);
        }
    }
}

fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>, ExportError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ExportError::Read {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Write to a sibling temp file and rename over `path`. A failed write leaves
/// the previous file (or no file) in place.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let write_err = |source: std::io::Error| ExportError::Write {
        path: path.display().to_string(),
        source,
    };
    let dir = path
        .parent()
        .ok_or_else(|| write_err(std::io::Error::other("record path has no parent directory")))?;
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_bytes_sort_keys_and_end_with_newline() {
        let doc = json!({"b": 1, "a": {"d": 2, "c": 3}});
        let bytes = canonical_bytes(&doc).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            "{\n  \"a\": {\n    \"c\": 3,\n    \"d\": 2\n  },\n  \"b\": 1\n}\n"
        );
    }

    #[test]
    fn belongs_to_skips_self_and_negatives() {
        let h = json!([
            {"postalcode_id": 5, "region_id": 85, "country_id": 85633159},
            {"region_id": 85, "county_id": -1}
        ]);
        assert_eq!(belongs_to(Some(&h), 5), vec![85, 85633159]);
        assert!(belongs_to(None, 5).is_empty());
    }

    #[test]
    fn normalise_sets_both_ids() {
        let mut doc = json!({"type": "Feature", "properties": {"wof:name": "M1 1AE"}});
        normalise(&mut doc, 42);
        assert_eq!(doc["id"], 42);
        assert_eq!(doc["properties"]["wof:id"], 42);
        assert_eq!(doc["properties"]["wof:belongsto"], json!([]));
    }
}
