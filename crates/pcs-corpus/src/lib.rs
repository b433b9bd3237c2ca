//! pcs-corpus
//!
//! The maintained record tree: identifier -> path mapping, enumeration,
//! record loading and the change-only exporter. Records are GeoJSON features
//! stored one per file.

pub mod export;
pub mod ids;
pub mod record;
pub mod uri;

pub use export::{canonical_bytes, ExportError, ExportOutcome, Exporter};
pub use ids::{IdMinter, SequentialIdMinter};
pub use record::{is_specified, ExistingRecord, MalformedReason, MalformedRecordError};
pub use uri::{id_to_abs_path, id_to_rel_path};

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("corpus walk failed under '{root}': {message}")]
    Walk { root: String, message: String },
    #[error("cannot read record '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Record files under `root`, in file-name order within each directory.
///
/// Alternate geometries (`-alt-` in the file name) are not records of their own.
pub fn walk_records(root: &Path) -> impl Iterator<Item = Result<PathBuf, CorpusError>> {
    let root_s = root.display().to_string();
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(move |entry| match entry {
            Ok(e) if e.file_type().is_file() && is_record_file(e.path()) => {
                Some(Ok(e.into_path()))
            }
            Ok(_) => None,
            Err(e) => Some(Err(CorpusError::Walk {
                root: root_s.clone(),
                message: e.to_string(),
            })),
        })
}

fn is_record_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with(".geojson") && !n.contains("-alt-"))
        .unwrap_or(false)
}

/// Read and decode one record file.
pub fn load_record(path: &Path) -> Result<ExistingRecord, RecordLoadError> {
    let raw = std::fs::read(path).map_err(|source| CorpusError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Ok(ExistingRecord::from_bytes(path.to_path_buf(), raw)?)
}

#[derive(Debug, thiserror::Error)]
pub enum RecordLoadError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),
    #[error(transparent)]
    Malformed(#[from] MalformedRecordError),
}
