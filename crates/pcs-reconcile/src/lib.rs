//! pcs-reconcile
//!
//! Two-pass reconciliation of the corpus against the registry.
//!
//! Pass one walks existing records on a bounded worker pool: each record is
//! ceased, deprecated, updated or skipped, and its code is added to the seen
//! set. Pass two starts only after pass one has fully drained and creates a
//! record for every registry entry that was not seen and that the creation
//! policy allows.
//!
//! Per-record failures are counted and logged. With fail-fast (the default)
//! the first one stops dispatch and is returned once in-flight work finishes.

mod counters;
mod driver;
mod policy;
mod pool;
mod seen;

pub use counters::{OutcomeCounters, OutcomeCounts};
pub use driver::{RecordError, RecordFailure, Reconciler, RunError, RunOptions, RunSummary};
pub use policy::{CreationPolicy, DenylistPolicy};
pub use pool::{run_pool, PoolError, PoolOptions};
pub use seen::SeenSet;
