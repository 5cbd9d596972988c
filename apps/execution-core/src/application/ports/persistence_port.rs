//! Persistence Store Port (Driven Port)
//!
//! Durable order, position and ledger records. The store is the only
//! component that resolves write-write races: order and position writes
//! carry the version that was read, and live fingerprints are unique.

use async_trait::async_trait;

use crate::domain::idempotency::{Fingerprint, IdempotencyRecord};
use crate::domain::order_execution::{Order, OrderUpdate};
use crate::domain::position::{Position, PositionKey};
use crate::domain::reconciliation::{ReconciliationCheckpoint, ReconciliationRun};
use crate::domain::shared::{ClientOrderId, Timestamp, VenueOrderId};

/// Everything a fill changes, committed as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillCommit {
    /// Dedup key recorded with the fill.
    pub dedup_key: String,
    /// Order the fill belongs to.
    pub client_order_id: ClientOrderId,
    /// Order version that was read.
    pub expected_order_version: u64,
    /// Changes to the order row.
    pub order_update: OrderUpdate,
    /// New position state.
    pub position: Position,
    /// Position version that was read; `None` if no row existed.
    pub expected_position_version: Option<u64>,
    /// Commit time.
    pub committed_at: Timestamp,
}

/// Result of committing a fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillCommitOutcome {
    /// The fill was applied; stored rows after the write.
    Applied {
        /// Order after the write.
        order: Order,
        /// Position after the write.
        position: Position,
    },
    /// The dedup key was already recorded; nothing changed.
    Duplicate,
}

/// Entries removed by `PersistenceStore::prune`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneSummary {
    /// Expired idempotency records.
    pub fingerprints: usize,
    /// Dedup keys older than the cutoff.
    pub dedup_keys: usize,
}

impl PruneSummary {
    /// Total entries removed.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.fingerprints + self.dedup_keys
    }
}

/// Persistence error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistenceError {
    /// The row changed since it was read.
    #[error("Version conflict on {entity} {id}: expected {expected}, found {actual}")]
    VersionConflict {
        /// Entity kind.
        entity: &'static str,
        /// Row id.
        id: String,
        /// Version the writer read.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// A live record already claims the fingerprint.
    #[error("Fingerprint {fingerprint} already claimed by order {existing}")]
    DuplicateFingerprint {
        /// The fingerprint.
        fingerprint: Fingerprint,
        /// Order holding the claim.
        existing: ClientOrderId,
    },

    /// An order with the same client order id exists.
    #[error("Order already exists: {0}")]
    DuplicateOrder(ClientOrderId),

    /// Row not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind.
        entity: &'static str,
        /// Row id.
        id: String,
    },

    /// Store did not answer in time.
    #[error("Store call timed out")]
    Timeout,

    /// Store unreachable or failed.
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },
}

impl PersistenceError {
    /// Returns true for optimistic-version conflicts.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}

/// Port for durable state.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    // ========================================================================
    // Idempotency
    // ========================================================================

    /// Look up the record for a fingerprint, live or expired.
    async fn find_idempotency_record(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<IdempotencyRecord>, PersistenceError>;

    /// Insert a new order and claim its fingerprint atomically.
    ///
    /// An expired record for the same fingerprint is replaced. A live one
    /// fails with `DuplicateFingerprint` and nothing is written.
    async fn create_order_with_fingerprint(
        &self,
        order: &Order,
        record: &IdempotencyRecord,
    ) -> Result<Order, PersistenceError>;

    /// Drop the claim on a fingerprint if it is still held by `client_order_id`.
    async fn release_fingerprint(
        &self,
        fingerprint: &Fingerprint,
        client_order_id: &ClientOrderId,
    ) -> Result<(), PersistenceError>;

    // ========================================================================
    // Orders
    // ========================================================================

    /// Load an order by client order id.
    async fn get_order(&self, id: &ClientOrderId) -> Result<Option<Order>, PersistenceError>;

    /// Load an order by venue order id.
    async fn find_order_by_venue_id(
        &self,
        venue_order_id: &VenueOrderId,
    ) -> Result<Option<Order>, PersistenceError>;

    /// Apply a partial update if the stored version matches.
    ///
    /// Omitted venue fields keep their stored value; `error_message` follows
    /// its `FieldPatch`, so an explicit clear erases it.
    async fn update_order(
        &self,
        id: &ClientOrderId,
        expected_version: u64,
        update: OrderUpdate,
        now: Timestamp,
    ) -> Result<Order, PersistenceError>;

    /// Non-terminal orders, oldest first.
    async fn list_open_orders(&self) -> Result<Vec<Order>, PersistenceError>;

    // ========================================================================
    // Positions and fills
    // ========================================================================

    /// Load a position.
    async fn get_position(&self, key: &PositionKey) -> Result<Option<Position>, PersistenceError>;

    /// All positions, including closed ones.
    async fn list_positions(&self) -> Result<Vec<Position>, PersistenceError>;

    /// Commit an order update, position and dedup key together.
    async fn commit_fill(&self, commit: FillCommit) -> Result<FillCommitOutcome, PersistenceError>;

    /// Returns true if the dedup key was already recorded.
    async fn has_event(&self, dedup_key: &str) -> Result<bool, PersistenceError>;

    /// Record a dedup key for a non-fill event. Returns false if it existed.
    async fn record_event(&self, dedup_key: &str, now: Timestamp) -> Result<bool, PersistenceError>;

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Load the reconciliation checkpoint.
    async fn load_checkpoint(&self) -> Result<ReconciliationCheckpoint, PersistenceError>;

    /// Store the reconciliation checkpoint.
    async fn save_checkpoint(
        &self,
        checkpoint: &ReconciliationCheckpoint,
    ) -> Result<(), PersistenceError>;

    /// Store a run summary.
    async fn save_run(&self, run: &ReconciliationRun) -> Result<(), PersistenceError>;

    // ========================================================================
    // Retention
    // ========================================================================

    /// Remove idempotency records no longer live at `now` and dedup keys
    /// recorded before `dedup_cutoff`.
    async fn prune(
        &self,
        now: Timestamp,
        dedup_cutoff: Timestamp,
    ) -> Result<PruneSummary, PersistenceError>;
}
