use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use pcs_schemas::{ReconcileOutcome, SkipReason};

const SKIP_REASONS: [SkipReason; 7] = [
    SkipReason::ForeignJurisdiction,
    SkipReason::PrefixFiltered,
    SkipReason::UpdatesDisabled,
    SkipReason::AlreadyTerminal,
    SkipReason::Unchanged,
    SkipReason::AlreadySeen,
    SkipReason::Ineligible,
];

fn skip_index(reason: SkipReason) -> usize {
    match reason {
        SkipReason::ForeignJurisdiction => 0,
        SkipReason::PrefixFiltered => 1,
        SkipReason::UpdatesDisabled => 2,
        SkipReason::AlreadyTerminal => 3,
        SkipReason::Unchanged => 4,
        SkipReason::AlreadySeen => 5,
        SkipReason::Ineligible => 6,
    }
}

/// One independent atomic per category; no cross-category coordination.
#[derive(Debug, Default)]
pub struct OutcomeCounters {
    ceased: AtomicU64,
    deprecated: AtomicU64,
    updated: AtomicU64,
    created: AtomicU64,
    skipped: [AtomicU64; 7],
    errored: AtomicU64,
}

impl OutcomeCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: ReconcileOutcome) {
        let slot = match outcome {
            ReconcileOutcome::Ceased => &self.ceased,
            ReconcileOutcome::Deprecated => &self.deprecated,
            ReconcileOutcome::Updated => &self.updated,
            ReconcileOutcome::Created => &self.created,
            ReconcileOutcome::Skipped(reason) => &self.skipped[skip_index(reason)],
        };
        slot.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> OutcomeCounts {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let mut skipped_by_reason = Vec::with_capacity(SKIP_REASONS.len());
        for reason in SKIP_REASONS {
            let n = load(&self.skipped[skip_index(reason)]);
            if n > 0 {
                skipped_by_reason.push((reason, n));
            }
        }
        OutcomeCounts {
            ceased: load(&self.ceased),
            deprecated: load(&self.deprecated),
            updated: load(&self.updated),
            created: load(&self.created),
            skipped: skipped_by_reason.iter().map(|(_, n)| n).sum(),
            errored: load(&self.errored),
            skipped_by_reason,
        }
    }
}

/// Point-in-time totals. `Display` is the end-of-run summary line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub ceased: u64,
    pub deprecated: u64,
    pub updated: u64,
    pub created: u64,
    pub skipped: u64,
    pub errored: u64,
    /// Non-zero skip reasons only.
    pub skipped_by_reason: Vec<(SkipReason, u64)>,
}

impl OutcomeCounts {
    pub fn skipped_for(&self, reason: SkipReason) -> u64 {
        self.skipped_by_reason
            .iter()
            .find(|(r, _)| *r == reason)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

impl fmt::Display for OutcomeCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ceased={} deprecated={} updated={} created={} skipped={} errored={}",
            self.ceased, self.deprecated, self.updated, self.created, self.skipped, self.errored
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tallies_by_category_and_reason() {
        let c = OutcomeCounters::new();
        c.record(ReconcileOutcome::Ceased);
        c.record(ReconcileOutcome::Updated);
        c.record(ReconcileOutcome::Updated);
        c.record(ReconcileOutcome::Skipped(SkipReason::Unchanged));
        c.record(ReconcileOutcome::Skipped(SkipReason::AlreadySeen));
        c.record(ReconcileOutcome::Skipped(SkipReason::AlreadySeen));
        c.record_error();

        let s = c.snapshot();
        assert_eq!((s.ceased, s.updated, s.skipped, s.errored), (1, 2, 3, 1));
        assert_eq!(s.skipped_for(SkipReason::AlreadySeen), 2);
        assert_eq!(s.skipped_for(SkipReason::Ineligible), 0);
        assert_eq!(
            s.to_string(),
            "ceased=1 deprecated=0 updated=2 created=0 skipped=3 errored=1"
        );
    }
}
