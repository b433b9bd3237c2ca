use std::sync::atomic::{AtomicI64, Ordering};

use crate::ExportError;

/// Source of identifiers for newly created records.
pub trait IdMinter: Send + Sync {
    fn mint(&self) -> Result<i64, ExportError>;
}

/// Hands out consecutive identifiers above a floor. Safe to share across workers.
#[derive(Debug)]
pub struct SequentialIdMinter {
    next: AtomicI64,
}

impl SequentialIdMinter {
    /// First minted identifier is `floor + 1` (never below 1).
    pub fn starting_after(floor: i64) -> Self {
        Self {
            next: AtomicI64::new(floor.max(0).saturating_add(1)),
        }
    }
}

impl IdMinter for SequentialIdMinter {
    fn mint(&self) -> Result<i64, ExportError> {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        if id <= 0 {
            return Err(ExportError::Mint("identifier space exhausted".to_string()));
        }
        Ok(id)
    }
}
