//! Reconciliation configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Reconciliation cadence and cost bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Periodic reconciliation cadence.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Overall budget for the startup run.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Per-order venue calls allowed per run.
    #[serde(default = "default_max_individual_lookups")]
    pub max_individual_lookups: u32,
    /// Overlap subtracted from the checkpoint when querying fills.
    #[serde(default = "default_overlap")]
    pub overlap_seconds: u64,
    /// Age after which an unconfirmed order with no venue record fails.
    #[serde(default = "default_grace")]
    pub submitted_unconfirmed_grace_seconds: u64,
    /// Page through historical fills from a persisted cursor.
    #[serde(default)]
    pub fills_backfill_enabled: bool,
    /// Initial lookback for the backfill cursor and first window.
    #[serde(default = "default_backfill_lookback")]
    pub fills_backfill_initial_lookback_hours: u64,
    /// Fills per page.
    #[serde(default = "default_backfill_page_size")]
    pub fills_backfill_page_size: u32,
    /// Pages per run.
    #[serde(default = "default_backfill_max_pages")]
    pub fills_backfill_max_pages: u32,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval(),
            timeout_seconds: default_timeout(),
            max_individual_lookups: default_max_individual_lookups(),
            overlap_seconds: default_overlap(),
            submitted_unconfirmed_grace_seconds: default_grace(),
            fills_backfill_enabled: false,
            fills_backfill_initial_lookback_hours: default_backfill_lookback(),
            fills_backfill_page_size: default_backfill_page_size(),
            fills_backfill_max_pages: default_backfill_max_pages(),
        }
    }
}

impl ReconciliationConfig {
    /// Poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    /// Startup run budget.
    #[must_use]
    pub const fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Window overlap.
    #[must_use]
    pub fn overlap(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.overlap_seconds).unwrap_or(i64::MAX))
    }

    /// Grace period for unconfirmed orders.
    #[must_use]
    pub fn grace_period(&self) -> chrono::Duration {
        chrono::Duration::seconds(
            i64::try_from(self.submitted_unconfirmed_grace_seconds).unwrap_or(i64::MAX),
        )
    }

    /// Initial lookback.
    #[must_use]
    pub fn initial_lookback(&self) -> chrono::Duration {
        chrono::Duration::hours(
            i64::try_from(self.fills_backfill_initial_lookback_hours).unwrap_or(i64::MAX),
        )
    }
}

const fn default_poll_interval() -> u64 {
    300 // 5 minutes
}

const fn default_timeout() -> u64 {
    300
}

const fn default_max_individual_lookups() -> u32 {
    100
}

const fn default_overlap() -> u64 {
    60
}

const fn default_grace() -> u64 {
    300
}

const fn default_backfill_lookback() -> u64 {
    24
}

const fn default_backfill_page_size() -> u32 {
    100
}

const fn default_backfill_max_pages() -> u32 {
    5
}
