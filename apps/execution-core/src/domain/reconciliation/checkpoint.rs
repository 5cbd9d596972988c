//! Checkpoint and fill window.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::domain::shared::Timestamp;

/// Progress persisted between reconciliation runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationCheckpoint {
    /// Start time of the last run whose fill window was fully scanned, or
    /// handed over to `window_resume`.
    pub last_run_started_at: Option<Timestamp>,
    /// Execution time of the last fill seen by the backfill pass.
    pub backfill_cursor: Option<Timestamp>,
    /// Window scan that hit the page limit; drained before the next window.
    #[serde(default)]
    pub window_resume: Option<FillScanCursor>,
}

/// Position inside an unfinished fill scan.
///
/// Page tokens are only meaningful for the query that produced them, so the
/// query bounds are kept alongside the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillScanCursor {
    /// Inclusive start of the interrupted query.
    pub since: Timestamp,
    /// Inclusive end of the interrupted query.
    pub until: Timestamp,
    /// Token of the first page not yet read.
    pub page_token: String,
}

/// Time range queried for venue fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillWindow {
    /// Inclusive start.
    pub start: Timestamp,
    /// Inclusive end.
    pub end: Timestamp,
}

impl FillWindow {
    /// `[checkpoint - overlap, now]`, or `[now - lookback, now]` without a
    /// checkpoint.
    #[must_use]
    pub fn for_run(
        checkpoint: &ReconciliationCheckpoint,
        now: Timestamp,
        overlap: Duration,
        initial_lookback: Duration,
    ) -> Self {
        let start = checkpoint
            .last_run_started_at
            .map_or(now - initial_lookback, |last| last - overlap);
        Self {
            start: start.min(now),
            end: now,
        }
    }
}
