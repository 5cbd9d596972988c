//! Idempotency records and window logic.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::Fingerprint;
use crate::domain::shared::{ClientOrderId, Timestamp};

/// Fingerprint → client order id mapping with an expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    /// Submission fingerprint.
    pub fingerprint: Fingerprint,
    /// Order created for the fingerprint.
    pub client_order_id: ClientOrderId,
    /// When the record was claimed.
    pub created_at: Timestamp,
    /// After this instant a repeated request creates a new order.
    pub expires_at: Timestamp,
}

impl IdempotencyRecord {
    /// Returns true if the record still blocks duplicate submissions.
    #[must_use]
    pub fn is_live(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }
}

/// Window policy for idempotency records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdempotencyLedger {
    window: Duration,
}

impl IdempotencyLedger {
    /// Create a ledger policy with the given window.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Get the idempotency window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Build the record to claim for a new order.
    #[must_use]
    pub fn record_for(
        &self,
        fingerprint: Fingerprint,
        client_order_id: ClientOrderId,
        now: Timestamp,
    ) -> IdempotencyRecord {
        IdempotencyRecord {
            fingerprint,
            client_order_id,
            created_at: now,
            expires_at: now + self.window,
        }
    }

    /// Resolve a looked-up record: the prior order id if it is still live.
    #[must_use]
    pub fn resolve(
        &self,
        existing: Option<&IdempotencyRecord>,
        now: Timestamp,
    ) -> Option<ClientOrderId> {
        existing
            .filter(|record| record.is_live(now))
            .map(|record| record.client_order_id.clone())
    }
}
