use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a record or registry entry was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkipReason {
    /// Record belongs to a different jurisdiction.
    ForeignJurisdiction,
    /// Code does not match the operator's prefix filter.
    PrefixFiltered,
    /// Updates disabled for this run.
    UpdatesDisabled,
    /// Cease/deprecate target already carries its terminal marker.
    AlreadyTerminal,
    /// Enriched form equals the stored form.
    Unchanged,
    /// Registry entry already has a record in the corpus.
    AlreadySeen,
    /// Creation policy refused the entry.
    Ineligible,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::ForeignJurisdiction => "foreign_jurisdiction",
            SkipReason::PrefixFiltered => "prefix_filtered",
            SkipReason::UpdatesDisabled => "updates_disabled",
            SkipReason::AlreadyTerminal => "already_terminal",
            SkipReason::Unchanged => "unchanged",
            SkipReason::AlreadySeen => "already_seen",
            SkipReason::Ineligible => "ineligible",
        }
    }
}

/// Result of reconciling one record or registry entry.
///
/// `Errored` is not represented here: failures travel as `Err` values and the
/// driver tallies them separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReconcileOutcome {
    Ceased,
    Deprecated,
    Updated,
    Created,
    Skipped(SkipReason),
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Ceased => "ceased",
            ReconcileOutcome::Deprecated => "deprecated",
            ReconcileOutcome::Updated => "updated",
            ReconcileOutcome::Created => "created",
            ReconcileOutcome::Skipped(_) => "skipped",
        }
    }
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileOutcome::Skipped(reason) => write!(f, "skipped({})", reason.as_str()),
            other => f.write_str(other.as_str()),
        }
    }
}
