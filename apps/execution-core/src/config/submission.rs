//! Submission path configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timeouts and retry bounds for the submission and fill paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// How long a fingerprint blocks an identical request.
    #[serde(default = "default_idempotency_window")]
    pub idempotency_window_seconds: u64,
    /// Budget for one venue call.
    #[serde(default = "default_venue_timeout")]
    pub venue_timeout_ms: u64,
    /// Budget for one store call.
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,
    /// Rereads after an optimistic version conflict.
    #[serde(default = "default_max_version_retries")]
    pub max_version_retries: u32,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            idempotency_window_seconds: default_idempotency_window(),
            venue_timeout_ms: default_venue_timeout(),
            store_timeout_ms: default_store_timeout(),
            max_version_retries: default_max_version_retries(),
        }
    }
}

impl SubmissionConfig {
    /// Idempotency window.
    #[must_use]
    pub fn idempotency_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.idempotency_window_seconds).unwrap_or(i64::MAX))
    }

    /// Venue call timeout.
    #[must_use]
    pub const fn venue_timeout(&self) -> Duration {
        Duration::from_millis(self.venue_timeout_ms)
    }

    /// Store call timeout.
    #[must_use]
    pub const fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

const fn default_idempotency_window() -> u64 {
    86_400 // 24 hours
}

const fn default_venue_timeout() -> u64 {
    10_000
}

const fn default_store_timeout() -> u64 {
    5_000
}

const fn default_max_version_retries() -> u32 {
    3
}
