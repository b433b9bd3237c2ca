//! Identifier -> storage path.
//!
//! The decimal identifier is cut into three-digit groups from the left; each
//! group is a directory and the file is `<id>.geojson`:
//! `101748123` -> `101/748/123/101748123.geojson`.

use std::path::{Path, PathBuf};

pub fn id_to_rel_path(id: i64) -> Option<PathBuf> {
    if id < 0 {
        return None;
    }
    let digits = id.to_string();
    let mut path = PathBuf::new();
    for chunk in digits.as_bytes().chunks(3) {
        // Digits are ASCII, so every chunk is valid UTF-8.
        path.push(std::str::from_utf8(chunk).ok()?);
    }
    path.push(format!("{digits}.geojson"));
    Some(path)
}

pub fn id_to_abs_path(root: &Path, id: i64) -> Option<PathBuf> {
    id_to_rel_path(id).map(|rel| root.join(rel))
}
