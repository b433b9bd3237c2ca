use pcs_config::GeometrySettings;
use pcs_hierarchy::ResolverError;

/// Geometry handling for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichPolicy {
    /// Code prefixes whose coordinates may not be published.
    pub restricted_prefixes: Vec<String>,
    /// Operator waiver for `restricted_prefixes`.
    pub ignore_restrictive_licence: bool,
    /// Registry latitude meaning "no known geometry".
    pub sentinel_latitude: String,
    /// `src:geom` for registry-sourced coordinates.
    pub source_tag: String,
}

impl EnrichPolicy {
    pub fn from_settings(geometry: &GeometrySettings, ignore_restrictive_licence: bool) -> Self {
        Self {
            restricted_prefixes: geometry.restricted_prefixes.clone(),
            ignore_restrictive_licence,
            sentinel_latitude: geometry.registry_sentinel_latitude.clone(),
            source_tag: geometry.source_tag.clone(),
        }
    }

    /// Coordinates for `code` may not be published under this policy.
    pub fn is_restricted(&self, code: &str) -> bool {
        !self.ignore_restrictive_licence
            && self
                .restricted_prefixes
                .iter()
                .any(|p| !p.is_empty() && code.starts_with(p.as_str()))
    }
}

impl Default for EnrichPolicy {
    fn default() -> Self {
        Self::from_settings(&GeometrySettings::default(), false)
    }
}

/// Source tag written for null island.
pub const SRC_GEOM_UNKNOWN: &str = "unknown";

/// Where a record's point comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    Registry { latitude: f64, longitude: f64 },
    /// (0, 0): restricted or no known geometry.
    NullIsland,
}

impl Placement {
    pub fn coordinates(&self) -> (f64, f64) {
        match self {
            Placement::Registry {
                latitude,
                longitude,
            } => (*latitude, *longitude),
            Placement::NullIsland => (0.0, 0.0),
        }
    }

    pub fn is_null_island(&self) -> bool {
        matches!(self, Placement::NullIsland)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    #[error("registry entry '{code}' has invalid {field} '{raw}'")]
    InvalidCoordinate {
        code: String,
        field: &'static str,
        raw: String,
    },
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error(transparent)]
    Resolver(#[from] ResolverError),
}
