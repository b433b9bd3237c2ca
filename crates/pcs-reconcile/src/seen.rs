use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard};

/// Codes observed in pass one. Shared by every pass-one worker.
#[derive(Debug, Default)]
pub struct SeenSet {
    inner: Mutex<HashSet<String>>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check and insert under one lock. True when `code` was not yet present.
    pub fn insert(&self, code: &str) -> bool {
        let mut set = self.lock();
        if set.contains(code) {
            return false;
        }
        set.insert(code.to_string())
    }

    pub fn contains(&self, code: &str) -> bool {
        self.lock().contains(code)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Sorted copy of the membership.
    pub fn snapshot(&self) -> BTreeSet<String> {
        self.lock().iter().cloned().collect()
    }

    // A panicking worker cannot leave the set half-updated, so a poisoned
    // lock is still safe to read.
    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
