//! pcs-enrich
//!
//! Record transformations driven by the registry:
//! - [`enrich`]: dates, geometry, hierarchy and OS codes from a registry entry.
//! - [`cease`] / [`deprecate`]: terminal lifecycle transitions.
//! - [`synthesize`]: skeleton for a code the corpus has never held.
//!
//! Every function takes the stored document by reference and returns a new
//! one. Nothing here touches disk; export is the caller's job.

mod enrich;
mod lifecycle;
mod synth;
mod types;

pub use enrich::enrich;
pub use lifecycle::{cease, deprecate};
pub use synth::synthesize;
pub use types::*;
