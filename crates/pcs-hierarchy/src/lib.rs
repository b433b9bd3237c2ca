//! pcs-hierarchy
//!
//! Resolver boundary for administrative parentage.
//!
//! Two strategies implement [`HierarchyResolver`]:
//! - [`SpatialResolver`]: point-in-polygon over HTTP, first allowed candidate wins.
//! - [`PrefixTableResolver`]: outward code -> postal region, built once from disk.
//!
//! "No enclosing region" is `Ok(None)`, never an error. Errors are reserved for
//! transport and decode failures, which leave the caller's record untouched.

pub mod prefix;
pub mod spatial;

pub use prefix::{PostalRegion, PrefixTableResolver};
pub use spatial::{select_parent, PipPlace, SpatialOptions, SpatialResolver};

use pcs_schemas::{Hierarchy, RegistryRecord};

/// Parent plus the ancestor chain written onto the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentResolution {
    pub parent_id: i64,
    pub hierarchy: Vec<Hierarchy>,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("resolver transport error: {0}")]
    Transport(String),
    #[error("resolver returned http {status}: {body}")]
    Status { status: u16, body: String },
    #[error("resolver response decode error: {0}")]
    Decode(String),
    #[error("resolver setup failed for '{path}': {message}")]
    Setup { path: String, message: String },
}

#[async_trait::async_trait]
pub trait HierarchyResolver: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    /// Enclosing parent for a registry entry, or `None` when nothing matches.
    ///
    /// Must be deterministic for a given entry and must not mutate caller state.
    async fn resolve_parent(
        &self,
        entry: &RegistryRecord,
    ) -> Result<Option<ParentResolution>, ResolverError>;
}
