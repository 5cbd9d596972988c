//! In-memory persistence store.
//!
//! All state sits behind one lock, so every trait method is atomic: a fill
//! commit either writes the order, the position and the dedup key, or
//! nothing. Version checks follow the same rules a SQL store would enforce
//! with `UPDATE ... WHERE version = ?`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::application::ports::{
    FillCommit, FillCommitOutcome, OrderUpdate, PersistenceError, PersistenceStore, PruneSummary,
};
use crate::domain::idempotency::{Fingerprint, IdempotencyRecord};
use crate::domain::order_execution::Order;
use crate::domain::position::{Position, PositionKey};
use crate::domain::reconciliation::{ReconciliationCheckpoint, ReconciliationRun};
use crate::domain::shared::{ClientOrderId, Timestamp, VenueOrderId};

#[derive(Debug, Default)]
struct StoreState {
    orders: HashMap<ClientOrderId, Order>,
    venue_index: HashMap<VenueOrderId, ClientOrderId>,
    fingerprints: HashMap<Fingerprint, IdempotencyRecord>,
    positions: HashMap<PositionKey, Position>,
    dedup_keys: HashMap<String, Timestamp>,
    checkpoint: ReconciliationCheckpoint,
    runs: Vec<ReconciliationRun>,
}

impl StoreState {
    fn index_venue_id(&mut self, order: &Order) {
        if let Some(venue_id) = order.venue_order_id() {
            self.venue_index
                .insert(venue_id.clone(), order.client_order_id().clone());
        }
    }

    fn order_for_write(
        &mut self,
        id: &ClientOrderId,
        expected_version: u64,
    ) -> Result<&mut Order, PersistenceError> {
        let order = self
            .orders
            .get_mut(id)
            .ok_or_else(|| PersistenceError::NotFound {
                entity: "order",
                id: id.to_string(),
            })?;
        if order.version() != expected_version {
            return Err(PersistenceError::VersionConflict {
                entity: "order",
                id: id.to_string(),
                expected: expected_version,
                actual: order.version(),
            });
        }
        Ok(order)
    }
}

/// In-memory implementation of `PersistenceStore`.
///
/// Suitable for testing, development and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
    unavailable: AtomicBool,
    fail_order_updates: AtomicBool,
}

impl InMemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make `update_order` fail while leaving other calls working.
    pub fn set_fail_order_updates(&self, fail: bool) {
        self.fail_order_updates.store(fail, Ordering::SeqCst);
    }

    /// Saved reconciliation runs, oldest first.
    #[must_use]
    pub fn runs(&self) -> Vec<ReconciliationRun> {
        self.read().runs.clone()
    }

    /// Number of stored orders.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.read().orders.len()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), PersistenceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable {
                message: "store offline".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceStore for InMemoryStore {
    async fn find_idempotency_record(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<IdempotencyRecord>, PersistenceError> {
        self.check_available()?;
        Ok(self.read().fingerprints.get(fingerprint).cloned())
    }

    async fn create_order_with_fingerprint(
        &self,
        order: &Order,
        record: &IdempotencyRecord,
    ) -> Result<Order, PersistenceError> {
        self.check_available()?;
        let mut state = self.write();

        if state.orders.contains_key(order.client_order_id()) {
            return Err(PersistenceError::DuplicateOrder(
                order.client_order_id().clone(),
            ));
        }
        if let Some(existing) = state.fingerprints.get(&record.fingerprint) {
            if existing.is_live(record.created_at) {
                return Err(PersistenceError::DuplicateFingerprint {
                    fingerprint: record.fingerprint.clone(),
                    existing: existing.client_order_id.clone(),
                });
            }
        }

        let mut stored = order.clone();
        stored.bump_version();
        state
            .fingerprints
            .insert(record.fingerprint.clone(), record.clone());
        state.index_venue_id(&stored);
        state
            .orders
            .insert(stored.client_order_id().clone(), stored.clone());
        drop(state);
        Ok(stored)
    }

    async fn release_fingerprint(
        &self,
        fingerprint: &Fingerprint,
        client_order_id: &ClientOrderId,
    ) -> Result<(), PersistenceError> {
        self.check_available()?;
        let mut state = self.write();
        let held_by_order = state
            .fingerprints
            .get(fingerprint)
            .is_some_and(|record| &record.client_order_id == client_order_id);
        if held_by_order {
            state.fingerprints.remove(fingerprint);
        }
        Ok(())
    }

    async fn get_order(&self, id: &ClientOrderId) -> Result<Option<Order>, PersistenceError> {
        self.check_available()?;
        Ok(self.read().orders.get(id).cloned())
    }

    async fn find_order_by_venue_id(
        &self,
        venue_order_id: &VenueOrderId,
    ) -> Result<Option<Order>, PersistenceError> {
        self.check_available()?;
        let state = self.read();
        Ok(state
            .venue_index
            .get(venue_order_id)
            .and_then(|id| state.orders.get(id))
            .cloned())
    }

    async fn update_order(
        &self,
        id: &ClientOrderId,
        expected_version: u64,
        update: OrderUpdate,
        now: Timestamp,
    ) -> Result<Order, PersistenceError> {
        self.check_available()?;
        if self.fail_order_updates.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable {
                message: "order update failed".to_string(),
            });
        }
        let mut state = self.write();
        let order = state.order_for_write(id, expected_version)?;
        order.merge(update, now);
        order.bump_version();
        let stored = order.clone();
        state.index_venue_id(&stored);
        drop(state);
        Ok(stored)
    }

    async fn list_open_orders(&self) -> Result<Vec<Order>, PersistenceError> {
        self.check_available()?;
        let mut open: Vec<Order> = self
            .read()
            .orders
            .values()
            .filter(|o| !o.status().is_terminal())
            .cloned()
            .collect();
        open.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.client_order_id().cmp(b.client_order_id()))
        });
        Ok(open)
    }

    async fn get_position(&self, key: &PositionKey) -> Result<Option<Position>, PersistenceError> {
        self.check_available()?;
        Ok(self.read().positions.get(key).cloned())
    }

    async fn list_positions(&self) -> Result<Vec<Position>, PersistenceError> {
        self.check_available()?;
        let mut positions: Vec<Position> = self.read().positions.values().cloned().collect();
        positions.sort_by(|a, b| a.key().cmp(b.key()));
        Ok(positions)
    }

    async fn commit_fill(&self, commit: FillCommit) -> Result<FillCommitOutcome, PersistenceError> {
        self.check_available()?;
        let mut state = self.write();

        if state.dedup_keys.contains_key(&commit.dedup_key) {
            return Ok(FillCommitOutcome::Duplicate);
        }

        let key = commit.position.key().clone();
        let stored_position_version = state.positions.get(&key).map(Position::version);
        if stored_position_version != commit.expected_position_version {
            return Err(PersistenceError::VersionConflict {
                entity: "position",
                id: key.to_string(),
                expected: commit.expected_position_version.unwrap_or(0),
                actual: stored_position_version.unwrap_or(0),
            });
        }

        let order = state.order_for_write(&commit.client_order_id, commit.expected_order_version)?;
        order.merge(commit.order_update, commit.committed_at);
        order.bump_version();
        let order = order.clone();
        state.index_venue_id(&order);

        let mut position = commit.position;
        position.version = stored_position_version.map_or(1, |v| v + 1);
        position.updated_at = commit.committed_at;
        state.positions.insert(key, position.clone());
        state
            .dedup_keys
            .insert(commit.dedup_key, commit.committed_at);
        drop(state);

        Ok(FillCommitOutcome::Applied { order, position })
    }

    async fn has_event(&self, dedup_key: &str) -> Result<bool, PersistenceError> {
        self.check_available()?;
        Ok(self.read().dedup_keys.contains_key(dedup_key))
    }

    async fn record_event(&self, dedup_key: &str, now: Timestamp) -> Result<bool, PersistenceError> {
        self.check_available()?;
        let mut state = self.write();
        if state.dedup_keys.contains_key(dedup_key) {
            return Ok(false);
        }
        state.dedup_keys.insert(dedup_key.to_string(), now);
        Ok(true)
    }

    async fn load_checkpoint(&self) -> Result<ReconciliationCheckpoint, PersistenceError> {
        self.check_available()?;
        Ok(self.read().checkpoint.clone())
    }

    async fn save_checkpoint(
        &self,
        checkpoint: &ReconciliationCheckpoint,
    ) -> Result<(), PersistenceError> {
        self.check_available()?;
        self.write().checkpoint = checkpoint.clone();
        Ok(())
    }

    async fn save_run(&self, run: &ReconciliationRun) -> Result<(), PersistenceError> {
        self.check_available()?;
        self.write().runs.push(run.clone());
        Ok(())
    }

    async fn prune(
        &self,
        now: Timestamp,
        dedup_cutoff: Timestamp,
    ) -> Result<PruneSummary, PersistenceError> {
        self.check_available()?;
        let mut state = self.write();

        let fingerprints = state.fingerprints.len();
        state.fingerprints.retain(|_, record| record.is_live(now));
        let dedup_keys = state.dedup_keys.len();
        state
            .dedup_keys
            .retain(|_, recorded_at| *recorded_at >= dedup_cutoff);

        Ok(PruneSummary {
            fingerprints: fingerprints - state.fingerprints.len(),
            dedup_keys: dedup_keys - state.dedup_keys.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::FieldPatch;
    use crate::domain::idempotency::IdempotencyLedger;
    use crate::domain::order_execution::{
        OrderRequest, OrderSide, OrderStateMachine, OrderStatus,
    };
    use crate::domain::shared::{Money, Quantity};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn t(secs: i64) -> Timestamp {
        Timestamp::parse("2026-01-19T14:00:00Z").unwrap() + Duration::seconds(secs)
    }

    fn new_order(id: &str) -> (Order, IdempotencyRecord) {
        let request = OrderRequest::limit(
            "AAPL",
            OrderSide::Buy,
            Quantity::from_i64(100),
            Money::new(dec!(150)),
            "s1",
        );
        let order = OrderStateMachine::create(request, id.into(), t(0)).unwrap();
        let record = IdempotencyLedger::new(Duration::seconds(60)).record_for(
            order.fingerprint().clone(),
            order.client_order_id().clone(),
            t(0),
        );
        (order, record)
    }

    #[tokio::test]
    async fn live_fingerprint_is_unique() {
        let store = InMemoryStore::new();
        let (order, record) = new_order("ord-1");
        let stored = store
            .create_order_with_fingerprint(&order, &record)
            .await
            .unwrap();
        assert_eq!(stored.version(), 1);

        let (twin, twin_record) = new_order("ord-2");
        let err = store
            .create_order_with_fingerprint(&twin, &twin_record)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::DuplicateFingerprint { existing, .. } if existing == ClientOrderId::new("ord-1")
        ));
        assert_eq!(store.order_count(), 1);
    }

    #[tokio::test]
    async fn expired_fingerprint_is_replaced() {
        let store = InMemoryStore::new();
        let (order, record) = new_order("ord-1");
        store
            .create_order_with_fingerprint(&order, &record)
            .await
            .unwrap();

        let (twin, mut twin_record) = new_order("ord-2");
        twin_record.created_at = t(120);
        twin_record.expires_at = t(180);
        store
            .create_order_with_fingerprint(&twin, &twin_record)
            .await
            .unwrap();

        let record = store
            .find_idempotency_record(order.fingerprint())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.client_order_id, ClientOrderId::new("ord-2"));
    }

    #[tokio::test]
    async fn prune_drops_expired_fingerprints_and_old_dedup_keys() {
        let store = InMemoryStore::new();
        let (old, old_record) = new_order("ord-1");
        store
            .create_order_with_fingerprint(&old, &old_record)
            .await
            .unwrap();
        let live_request = OrderRequest::limit(
            "MSFT",
            OrderSide::Sell,
            Quantity::from_i64(5),
            Money::new(dec!(400)),
            "s1",
        );
        let live = OrderStateMachine::create(live_request, "ord-2".into(), t(100)).unwrap();
        let live_record = IdempotencyLedger::new(Duration::seconds(60)).record_for(
            live.fingerprint().clone(),
            live.client_order_id().clone(),
            t(100),
        );
        store
            .create_order_with_fingerprint(&live, &live_record)
            .await
            .unwrap();
        assert!(store.record_event("fill:old", t(10)).await.unwrap());
        assert!(store.record_event("fill:new", t(110)).await.unwrap());

        let pruned = store.prune(t(120), t(60)).await.unwrap();

        assert_eq!(pruned, PruneSummary { fingerprints: 1, dedup_keys: 1 });
        assert!(store.find_idempotency_record(old.fingerprint()).await.unwrap().is_none());
        assert!(store.find_idempotency_record(live.fingerprint()).await.unwrap().is_some());
        assert!(!store.has_event("fill:old").await.unwrap());
        assert!(store.has_event("fill:new").await.unwrap());
        assert_eq!(store.order_count(), 2);
    }

    #[tokio::test]
    async fn explicit_null_clears_error_and_omitted_venue_id_is_kept() {
        let store = InMemoryStore::new();
        let (order, record) = new_order("ord-1");
        let id = order.client_order_id().clone();
        let stored = store
            .create_order_with_fingerprint(&order, &record)
            .await
            .unwrap();

        let first = OrderUpdate::status(OrderStatus::SubmittedUnconfirmed)
            .with_venue_order_id(VenueOrderId::new("v-1"))
            .with_error("venue timeout");
        let stored = store
            .update_order(&id, stored.version(), first, t(1))
            .await
            .unwrap();
        assert_eq!(stored.error_message(), Some("venue timeout"));

        let recover: OrderUpdate =
            serde_json::from_str(r#"{"status":"ACCEPTED","error_message":null}"#).unwrap();
        assert_eq!(recover.error_message, FieldPatch::Clear);
        let stored = store
            .update_order(&id, stored.version(), recover, t(2))
            .await
            .unwrap();

        assert_eq!(stored.error_message(), None);
        assert_eq!(stored.venue_order_id(), Some(&VenueOrderId::new("v-1")));
        assert_eq!(stored.status(), OrderStatus::Accepted);
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = InMemoryStore::new();
        let (order, record) = new_order("ord-1");
        let id = order.client_order_id().clone();
        let stored = store
            .create_order_with_fingerprint(&order, &record)
            .await
            .unwrap();
        store
            .update_order(&id, stored.version(), OrderUpdate::default().with_error("a"), t(1))
            .await
            .unwrap();

        let err = store
            .update_order(&id, stored.version(), OrderUpdate::default().with_error("b"), t(2))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn venue_id_lookup_and_release() {
        let store = InMemoryStore::new();
        let (order, record) = new_order("ord-1");
        let id = order.client_order_id().clone();
        let stored = store
            .create_order_with_fingerprint(&order, &record)
            .await
            .unwrap();
        store
            .update_order(
                &id,
                stored.version(),
                OrderUpdate::default().with_venue_order_id("v-9".into()),
                t(1),
            )
            .await
            .unwrap();
        let found = store
            .find_order_by_venue_id(&VenueOrderId::new("v-9"))
            .await
            .unwrap();
        assert_eq!(found.map(|o| o.client_order_id().clone()), Some(id.clone()));

        store
            .release_fingerprint(order.fingerprint(), &ClientOrderId::new("someone-else"))
            .await
            .unwrap();
        assert!(
            store
                .find_idempotency_record(order.fingerprint())
                .await
                .unwrap()
                .is_some()
        );
        store
            .release_fingerprint(order.fingerprint(), &id)
            .await
            .unwrap();
        assert!(
            store
                .find_idempotency_record(order.fingerprint())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn outage_fails_every_call() {
        let store = InMemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.list_open_orders().await,
            Err(PersistenceError::Unavailable { .. })
        ));
        store.set_unavailable(false);
        assert!(store.list_open_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn record_event_is_idempotent() {
        let store = InMemoryStore::new();
        assert!(store.record_event("cancel:e1", t(0)).await.unwrap());
        assert!(!store.record_event("cancel:e1", t(1)).await.unwrap());
        assert!(store.has_event("cancel:e1").await.unwrap());
    }
}
