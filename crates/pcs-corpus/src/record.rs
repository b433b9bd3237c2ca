//! One corpus record, decoded once at load time.
//!
//! The full document is kept as `serde_json::Value` (enrichment rewrites it)
//! together with the original bytes (the exporter diffs against them). The
//! fields the driver branches on are pulled out here so nothing downstream
//! has to inspect the document shape again.

use std::fmt;
use std::path::PathBuf;

pub use pcs_schemas::is_specified;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    InvalidJson(String),
    MissingName,
    MissingId,
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::InvalidJson(msg) => write!(f, "invalid json: {msg}"),
            MalformedReason::MissingName => f.write_str("name not found on existing record"),
            MalformedReason::MissingId => f.write_str("id not found on existing record"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("malformed record '{path}': {reason}")]
pub struct MalformedRecordError {
    pub path: String,
    pub name: Option<String>,
    pub reason: MalformedReason,
}

#[derive(Debug, Clone)]
pub struct ExistingRecord {
    pub path: PathBuf,
    /// Bytes exactly as stored.
    pub raw: Vec<u8>,
    pub doc: Value,
    pub id: i64,
    /// `wof:name`; in scope records carry a registry code here.
    pub name: String,
    /// `wof:country`.
    pub country: Option<String>,
    /// `mz:is_current`.
    pub is_current: Option<i64>,
    /// `edtf:deprecated`.
    pub deprecated: Option<String>,
    /// `edtf:cessation`.
    pub cessation: Option<String>,
}

impl ExistingRecord {
    pub fn from_bytes(path: PathBuf, raw: Vec<u8>) -> Result<Self, MalformedRecordError> {
        let malformed = |name: Option<String>, reason| MalformedRecordError {
            path: path.display().to_string(),
            name,
            reason,
        };

        let doc: Value = serde_json::from_slice(&raw)
            .map_err(|e| malformed(None, MalformedReason::InvalidJson(e.to_string())))?;
        let props = doc.get("properties");
        let prop_str = |key: &str| {
            props
                .and_then(|p| p.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        let name = prop_str("wof:name")
            .filter(|n| !n.is_empty())
            .ok_or_else(|| malformed(None, MalformedReason::MissingName))?;

        let id = doc
            .get("id")
            .and_then(Value::as_i64)
            .or_else(|| props.and_then(|p| p.get("wof:id")).and_then(Value::as_i64))
            .filter(|id| *id >= 0)
            .ok_or_else(|| malformed(Some(name.clone()), MalformedReason::MissingId))?;

        let country = prop_str("wof:country");
        let is_current = props
            .and_then(|p| p.get("mz:is_current"))
            .and_then(Value::as_i64);
        let deprecated = prop_str("edtf:deprecated");
        let cessation = prop_str("edtf:cessation");

        Ok(Self {
            path,
            raw,
            doc,
            id,
            name,
            country,
            is_current,
            deprecated,
            cessation,
        })
    }

    /// A cessation date is recorded. Terminal: never cleared.
    pub fn is_ceased(&self) -> bool {
        is_specified(self.cessation.as_deref())
    }

    /// A deprecation date is recorded. Terminal: never cleared.
    pub fn is_deprecated(&self) -> bool {
        is_specified(self.deprecated.as_deref())
    }
}
