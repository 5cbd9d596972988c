//! Consecutive broker failure counter.
//!
//! ```text
//! success        → count = 0
//! failure        → count += 1
//! count == limit → trip once (reason: broker-errors)
//! ```
//!
//! The counter lives in process memory. The breaker it trips is persisted in
//! the gate store, so a restart keeps the halt but forgets the count.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Counts consecutive venue failures against a threshold.
#[derive(Debug)]
pub struct BrokerErrorCounter {
    /// Failures that trip the breaker; 0 disables tripping.
    threshold: u32,
    /// Current run of failures.
    consecutive: AtomicU32,
    /// Total failures (for diagnostics).
    total_failures: AtomicU64,
}

impl BrokerErrorCounter {
    /// Create a counter.
    #[must_use]
    pub const fn new(threshold: u32) -> Self {
        Self {
            threshold,
            consecutive: AtomicU32::new(0),
            total_failures: AtomicU64::new(0),
        }
    }

    /// Record a successful venue call.
    pub fn record_success(&self) {
        self.consecutive.store(0, Ordering::Relaxed);
    }

    /// Record a failed venue call.
    ///
    /// Returns true exactly when this failure reaches the threshold.
    pub fn record_failure(&self) -> bool {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        let count = self.consecutive.fetch_add(1, Ordering::Relaxed) + 1;
        self.threshold > 0 && count == self.threshold
    }

    /// Current run of failures.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive.load(Ordering::Relaxed)
    }

    /// Total failures since start.
    #[must_use]
    pub fn total_failures(&self) -> u64 {
        self.total_failures.load(Ordering::Relaxed)
    }

    /// Configured threshold.
    #[must_use]
    pub const fn threshold(&self) -> u32 {
        self.threshold
    }
}
