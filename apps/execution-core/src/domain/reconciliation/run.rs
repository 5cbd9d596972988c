//! Reconciliation run summary.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::PositionDrift;
use crate::domain::shared::{ClientOrderId, Timestamp};

/// How a run was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Once at process start, before submissions are accepted.
    Startup,
    /// On the poll interval.
    Periodic,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Startup => write!(f, "startup"),
            Self::Periodic => write!(f, "periodic"),
        }
    }
}

/// Final state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Still executing.
    Running,
    /// All passes finished.
    Completed,
    /// A pass failed; counts reflect work done before the failure.
    Failed,
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationRun {
    /// Run identifier.
    pub run_id: Uuid,
    /// Invocation mode.
    pub mode: RunMode,
    /// Run status.
    pub status: RunStatus,
    /// Start time.
    pub started_at: Timestamp,
    /// End time.
    pub finished_at: Option<Timestamp>,
    /// Orders examined in the per-order pass.
    pub orders_checked: u32,
    /// Orders whose local state was repaired.
    pub orders_repaired: u32,
    /// Orders flagged for manual review.
    pub orders_flagged: u32,
    /// Per-order venue calls made.
    pub lookups_used: u32,
    /// Orders left for the next run once the lookup budget ran out.
    pub orders_deferred: u32,
    /// Missing fills applied.
    pub fills_applied: u32,
    /// Fills already known locally.
    pub fills_duplicate: u32,
    /// Orders moved to `FAILED` by the grace-period rule.
    pub stuck_failed: Vec<ClientOrderId>,
    /// Position disagreements found.
    pub drift: Vec<PositionDrift>,
    /// Failure detail when `status` is `Failed`.
    pub error: Option<String>,
}

impl ReconciliationRun {
    /// Start a run.
    #[must_use]
    pub fn start(mode: RunMode, now: Timestamp) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            status: RunStatus::Running,
            started_at: now,
            finished_at: None,
            orders_checked: 0,
            orders_repaired: 0,
            orders_flagged: 0,
            lookups_used: 0,
            orders_deferred: 0,
            fills_applied: 0,
            fills_duplicate: 0,
            stuck_failed: Vec::new(),
            drift: Vec::new(),
            error: None,
        }
    }

    /// Mark the run completed.
    pub fn complete(&mut self, now: Timestamp) {
        self.status = RunStatus::Completed;
        self.finished_at = Some(now);
    }

    /// Mark the run failed.
    pub fn fail(&mut self, error: impl Into<String>, now: Timestamp) {
        self.status = RunStatus::Failed;
        self.error = Some(error.into());
        self.finished_at = Some(now);
    }

    /// Returns true if drift was detected.
    #[must_use]
    pub fn has_drift(&self) -> bool {
        !self.drift.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_lifecycle() {
        let t0 = Timestamp::parse("2026-01-19T14:00:00Z").unwrap();
        let mut run = ReconciliationRun::start(RunMode::Periodic, t0);
        assert_eq!(run.status, RunStatus::Running);

        run.fail("venue down", t0);
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error.as_deref(), Some("venue down"));
        assert_eq!(run.finished_at, Some(t0));
        assert!(!run.has_drift());
    }
}
