//! Per-item outcomes and the final restore summary.

use serde::{Deserialize, Serialize};

use super::Phase;
use super::plan::{Disposition, RestorePlan};

/// What happened to one plan item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum Outcome {
    /// The mutation was performed.
    Applied,
    /// Would have been applied (dry run or preview).
    Planned,
    /// Not applicable given its disposition.
    Skipped,
    /// The mutation was attempted and failed.
    Failed {
        /// Error text.
        error: String,
    },
    /// Cancellation fired before the item was reached.
    NotRun,
}

/// Outcome of one plan item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Phase.
    pub phase: Phase,
    /// Item subject.
    pub subject: String,
    /// Planned disposition.
    pub disposition: Disposition,
    /// Result.
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Counts over all outcomes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Applied items.
    pub applied: usize,
    /// Planned items.
    pub planned: usize,
    /// Skipped items.
    pub skipped: usize,
    /// Failed items.
    pub failed: usize,
    /// Items left untouched by cancellation.
    pub not_run: usize,
}

impl Summary {
    /// What: Tally outcomes.
    ///
    /// Inputs:
    /// - `items`: Per-item outcomes.
    ///
    /// Output:
    /// - Counts per outcome kind.
    #[must_use]
    pub fn of(items: &[ItemOutcome]) -> Self {
        items.iter().fold(Self::default(), |mut s, i| {
            match i.outcome {
                Outcome::Applied => s.applied += 1,
                Outcome::Planned => s.planned += 1,
                Outcome::Skipped => s.skipped += 1,
                Outcome::Failed { .. } => s.failed += 1,
                Outcome::NotRun => s.not_run += 1,
            }
            s
        })
    }
}

/// Overall result of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    /// Nothing failed.
    Success,
    /// Some items failed or were not run.
    Partial,
    /// The operation stopped on a fatal error.
    Failure,
}

impl ReportStatus {
    /// Status implied by a summary.
    #[must_use]
    pub const fn from_summary(summary: &Summary) -> Self {
        if summary.failed > 0 || summary.not_run > 0 {
            Self::Partial
        } else {
            Self::Success
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failure => "failure",
        }
    }
}

/// Result of a restore run, dry or live.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RestoreReport {
    /// Whether nothing was allowed to mutate.
    pub dry_run: bool,
    /// The plan the run walked.
    pub plan: RestorePlan,
    /// One outcome per plan item, in plan order.
    pub outcomes: Vec<ItemOutcome>,
    /// Counts.
    pub summary: Summary,
    /// Overall status.
    pub status: ReportStatus,
}

impl RestoreReport {
    /// Failed items.
    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Failed { .. }))
    }
}
