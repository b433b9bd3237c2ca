//! Outward-code -> postal region table.
//!
//! Built once from a directory of region documents. Only documents with
//! `wof:placetype == "postalregion"` contribute; alternate geometries are
//! skipped. Lookups are pure map reads.

use std::collections::HashMap;
use std::path::Path;

use pcs_schemas::{postcode, Hierarchy, RegistryRecord};
use serde::Deserialize;
use walkdir::WalkDir;

use crate::{HierarchyResolver, ParentResolution, ResolverError};

const REGION_PLACETYPE: &str = "postalregion";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostalRegion {
    pub name: String,
    pub id: i64,
    pub hierarchy: Vec<Hierarchy>,
}

#[derive(Debug, Clone, Default)]
pub struct PrefixTableResolver {
    regions: HashMap<String, PostalRegion>,
}

#[derive(Debug, Deserialize)]
struct RegionDoc {
    id: Option<i64>,
    #[serde(default)]
    properties: RegionProps,
}

#[derive(Debug, Default, Deserialize)]
struct RegionProps {
    #[serde(rename = "wof:placetype")]
    placetype: Option<String>,
    #[serde(rename = "wof:name")]
    name: Option<String>,
    #[serde(rename = "wof:id")]
    id: Option<i64>,
    #[serde(rename = "wof:hierarchy", default)]
    hierarchy: Vec<Hierarchy>,
}

impl PrefixTableResolver {
    pub fn from_regions(regions: impl IntoIterator<Item = PostalRegion>) -> Self {
        Self {
            regions: regions
                .into_iter()
                .map(|r| (r.name.clone(), r))
                .collect(),
        }
    }

    /// Walk `root` and index every postal region document found.
    pub fn build(root: &Path) -> Result<Self, ResolverError> {
        let setup_err = |path: &Path, message: String| ResolverError::Setup {
            path: path.display().to_string(),
            message,
        };

        let mut regions = HashMap::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| setup_err(root, e.to_string()))?;
            if !entry.file_type().is_file() || !is_region_candidate(entry.path()) {
                continue;
            }

            let path = entry.path();
            let bytes = std::fs::read(path).map_err(|e| setup_err(path, e.to_string()))?;
            let doc: RegionDoc =
                serde_json::from_slice(&bytes).map_err(|e| setup_err(path, e.to_string()))?;

            if doc.properties.placetype.as_deref() != Some(REGION_PLACETYPE) {
                continue;
            }

            let name = doc
                .properties
                .name
                .ok_or_else(|| setup_err(path, "postal region without wof:name".to_string()))?;
            let id = doc
                .id
                .or(doc.properties.id)
                .ok_or_else(|| setup_err(path, "postal region without id".to_string()))?;

            regions.insert(
                name.clone(),
                PostalRegion {
                    name,
                    id,
                    hierarchy: doc.properties.hierarchy,
                },
            );
        }

        tracing::info!(root = %root.display(), regions = regions.len(), "postal region table built");
        Ok(Self { regions })
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn region_for(&self, code: &str) -> Option<&PostalRegion> {
        self.regions.get(postcode::outward_code(code))
    }
}

fn is_region_candidate(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };
    name.ends_with(".geojson") && !name.contains("-alt-")
}

#[async_trait::async_trait]
impl HierarchyResolver for PrefixTableResolver {
    fn name(&self) -> &'static str {
        "prefix"
    }

    async fn resolve_parent(
        &self,
        entry: &RegistryRecord,
    ) -> Result<Option<ParentResolution>, ResolverError> {
        match self.region_for(&entry.code) {
            Some(region) => Ok(Some(ParentResolution {
                parent_id: region.id,
                hierarchy: region.hierarchy.clone(),
            })),
            None => {
                tracing::warn!(
                    code = %entry.code,
                    outward = postcode::outward_code(&entry.code),
                    "no postal region for outward code"
                );
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alt_files_and_non_geojson_skipped() {
        assert!(is_region_candidate(Path::new("/d/123/123.geojson")));
        assert!(!is_region_candidate(Path::new("/d/123/123-alt-quattroshapes.geojson")));
        assert!(!is_region_candidate(Path::new("/d/123/README.md")));
    }

    #[test]
    fn region_for_uses_outward_code() {
        let t = PrefixTableResolver::from_regions(vec![PostalRegion {
            name: "SW1A".to_string(),
            id: 1360698645,
            hierarchy: Vec::new(),
        }]);
        assert_eq!(t.region_for("SW1A 1AA").map(|r| r.id), Some(1360698645));
        assert_eq!(t.region_for("SW1A1AA").map(|r| r.id), Some(1360698645));
        assert!(t.region_for("SW1P 3JX").is_none());
    }
}
