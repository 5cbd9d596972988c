//! Apply Fill Use Case
//!
//! The single write path for executions, shared by webhooks and
//! reconciliation. Order, position and dedup key are committed together, so
//! a fill is either fully applied once or not at all.

use std::sync::Arc;

use crate::application::context::ExecutionContext;
use crate::application::ports::{FillCommit, FillCommitOutcome, OrderUpdate};
use crate::domain::order_execution::{Fill, Order, OrderStateMachine};
use crate::domain::position::{FillEffect, Position, PositionAccount, PositionKey};
use crate::domain::shared::{ClientOrderId, VenueOrderId};
use crate::error::ExecutionError;

/// An execution to apply to a known order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillEvent {
    /// Local order.
    pub client_order_id: ClientOrderId,
    /// Venue order id, recorded if the order does not have one yet.
    pub venue_order_id: Option<VenueOrderId>,
    /// The execution.
    pub fill: Fill,
    /// Idempotency key for this execution.
    pub dedup_key: String,
}

/// Result of applying a fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillOutcome {
    /// Fill applied.
    Applied {
        /// Order after the fill.
        order: Order,
        /// Position after the fill.
        position: Position,
        /// What the fill did to the position.
        effect: FillEffect,
        /// The order was already terminal; its status was kept.
        late: bool,
    },
    /// Dedup key already recorded; nothing changed.
    Duplicate,
}

/// Use case for applying executions.
#[derive(Debug)]
pub struct ApplyFillUseCase {
    ctx: Arc<ExecutionContext>,
}

impl ApplyFillUseCase {
    /// Create a new `ApplyFillUseCase`.
    #[must_use]
    pub const fn new(ctx: Arc<ExecutionContext>) -> Self {
        Self { ctx }
    }

    /// Apply a fill exactly once.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the order does not exist
    /// - `InvalidTransition` on overfill
    /// - `Persistence` on store failure or after `max_version_retries`
    ///   conflicting writes
    pub async fn apply(&self, event: FillEvent) -> Result<FillOutcome, ExecutionError> {
        let max_retries = self.ctx.config().submission.max_version_retries;
        let mut attempt = 0;

        loop {
            if self
                .ctx
                .store_call(self.ctx.store().has_event(&event.dedup_key))
                .await?
            {
                tracing::debug!(dedup_key = %event.dedup_key, "Fill already applied");
                return Ok(FillOutcome::Duplicate);
            }

            let (commit, effect, late) = self.prepare(&event).await?;
            match self
                .ctx
                .store_call(self.ctx.store().commit_fill(commit))
                .await
            {
                Ok(FillCommitOutcome::Applied { order, position }) => {
                    if late {
                        tracing::warn!(
                            client_order_id = %order.client_order_id(),
                            status = %order.status(),
                            quantity = %event.fill.quantity,
                            "Late fill applied to terminal order"
                        );
                    } else {
                        tracing::info!(
                            client_order_id = %order.client_order_id(),
                            status = %order.status(),
                            filled_quantity = %order.filled_quantity(),
                            position = %position.key(),
                            position_quantity = %position.quantity(),
                            realized_pnl = %position.realized_pnl(),
                            ?effect,
                            "Fill applied"
                        );
                    }
                    return Ok(FillOutcome::Applied {
                        order,
                        position,
                        effect,
                        late,
                    });
                }
                Ok(FillCommitOutcome::Duplicate) => return Ok(FillOutcome::Duplicate),
                Err(e) if e.is_conflict() && attempt < max_retries => {
                    attempt += 1;
                    tracing::debug!(
                        client_order_id = %event.client_order_id,
                        attempt,
                        error = %e,
                        "Fill commit conflicted, rereading"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn prepare(
        &self,
        event: &FillEvent,
    ) -> Result<(FillCommit, FillEffect, bool), ExecutionError> {
        let now = self.ctx.now();
        let order = super::order_writes::load_order(&self.ctx, &event.client_order_id).await?;

        let late = order.status().is_terminal();
        let mut next = if late {
            OrderStateMachine::record_late_fill(&order, &event.fill, now)?
        } else {
            OrderStateMachine::apply_fill(&order, &event.fill, now)?
        };
        if next.venue_order_id().is_none() {
            next.venue_order_id.clone_from(&event.venue_order_id);
        }

        let key = PositionKey::new(order.symbol().clone(), order.strategy_id().clone());
        let existing = self
            .ctx
            .store_call(self.ctx.store().get_position(&key))
            .await?;
        let expected_position_version = existing.as_ref().map(Position::version);
        let base = existing.unwrap_or_else(|| Position::flat(key, now));
        let (position, effect) = PositionAccount::apply_fill(
            &base,
            order.side(),
            event.fill.quantity,
            event.fill.price,
            now,
        )?;

        let commit = FillCommit {
            dedup_key: event.dedup_key.clone(),
            client_order_id: order.client_order_id().clone(),
            expected_order_version: order.version(),
            order_update: OrderUpdate::between(&order, &next),
            position,
            expected_position_version,
            committed_at: now,
        };
        Ok((commit, effect, late))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{FieldPatch, PersistenceStore};
    use crate::config::Config;
    use crate::domain::idempotency::IdempotencyLedger;
    use crate::domain::order_execution::{OrderRequest, OrderSide, OrderStatus};
    use crate::domain::shared::{FillId, Money, Quantity, Timestamp};
    use crate::infrastructure::{InMemoryGateStore, InMemoryStore, ManualClock, SimulatedVenue};
    use rust_decimal_macros::dec;

    fn t0() -> Timestamp {
        Timestamp::parse("2026-01-19T14:00:00Z").unwrap()
    }

    async fn setup(side: OrderSide, qty: i64) -> (ApplyFillUseCase, Arc<InMemoryStore>, ClientOrderId) {
        let clock = Arc::new(ManualClock::new(t0()));
        let store = Arc::new(InMemoryStore::new());
        let ctx = Arc::new(ExecutionContext::new(
            store.clone(),
            Arc::new(SimulatedVenue::new(clock.clone())),
            Arc::new(InMemoryGateStore::new()),
            clock,
            Config::default(),
        ));
        let request = OrderRequest::market("AAPL", side, Quantity::from_i64(qty), "s1");
        let order = OrderStateMachine::create(request, ClientOrderId::new("ord-1"), t0()).unwrap();
        let record = IdempotencyLedger::new(chrono::Duration::hours(1)).record_for(
            order.fingerprint().clone(),
            order.client_order_id().clone(),
            t0(),
        );
        store
            .create_order_with_fingerprint(&order, &record)
            .await
            .unwrap();
        (ApplyFillUseCase::new(ctx), store, ClientOrderId::new("ord-1"))
    }

    fn event(id: &ClientOrderId, fill_id: &str, qty: i64, price: Money) -> FillEvent {
        FillEvent {
            client_order_id: id.clone(),
            venue_order_id: Some(VenueOrderId::new("v-1")),
            fill: Fill::new(
                Some(FillId::new(fill_id)),
                Quantity::from_i64(qty),
                price,
                t0(),
            ),
            dedup_key: format!("fill:{fill_id}"),
        }
    }

    #[tokio::test]
    async fn partial_then_full() {
        let (use_case, _, id) = setup(OrderSide::Buy, 100).await;

        let FillOutcome::Applied { order, .. } = use_case
            .apply(event(&id, "f1", 40, Money::new(dec!(100))))
            .await
            .unwrap()
        else {
            panic!("expected applied");
        };
        assert_eq!(order.status(), OrderStatus::PartiallyFilled);
        assert_eq!(order.venue_order_id(), Some(&VenueOrderId::new("v-1")));

        let FillOutcome::Applied {
            order, position, ..
        } = use_case
            .apply(event(&id, "f2", 60, Money::new(dec!(105))))
            .await
            .unwrap()
        else {
            panic!("expected applied");
        };
        assert_eq!(order.status(), OrderStatus::Filled);
        assert_eq!(order.filled_avg_price(), Some(Money::new(dec!(103))));
        assert_eq!(position.quantity(), Quantity::from_i64(100));
        assert_eq!(position.version(), 2);
    }

    #[tokio::test]
    async fn same_dedup_key_applies_once() {
        let (use_case, store, id) = setup(OrderSide::Buy, 100).await;
        let fill = event(&id, "f1", 40, Money::new(dec!(100)));

        use_case.apply(fill.clone()).await.unwrap();
        assert_eq!(use_case.apply(fill).await.unwrap(), FillOutcome::Duplicate);

        let order = store.get_order(&id).await.unwrap().unwrap();
        assert_eq!(order.filled_quantity(), Quantity::from_i64(40));
    }

    #[tokio::test]
    async fn late_fill_keeps_terminal_status_and_moves_position() {
        let (use_case, store, id) = setup(OrderSide::Sell, 100).await;
        let order = store.get_order(&id).await.unwrap().unwrap();
        let canceled =
            OrderStateMachine::apply_terminal(&order, OrderStatus::Canceled, None, t0()).unwrap();
        store
            .update_order(&id, order.version(), OrderUpdate::between(&order, &canceled), t0())
            .await
            .unwrap();

        let FillOutcome::Applied {
            order,
            position,
            late,
            ..
        } = use_case
            .apply(event(&id, "f1", 30, Money::new(dec!(50))))
            .await
            .unwrap()
        else {
            panic!("expected applied");
        };
        assert!(late);
        assert_eq!(order.status(), OrderStatus::Canceled);
        assert_eq!(order.filled_quantity(), Quantity::from_i64(30));
        assert!(order.error_message().is_some());
        assert_eq!(position.quantity(), Quantity::from_i64(-30));
    }

    #[tokio::test]
    async fn overfill_is_refused() {
        let (use_case, store, id) = setup(OrderSide::Buy, 10).await;
        let err = use_case
            .apply(event(&id, "f1", 11, Money::new(dec!(100))))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidTransition(_)));
        assert!(!store.has_event("fill:f1").await.unwrap());
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let (use_case, _, _) = setup(OrderSide::Buy, 10).await;
        let err = use_case
            .apply(event(&ClientOrderId::new("nope"), "f1", 1, Money::new(dec!(1))))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::NotFound(_)));
    }

    #[tokio::test]
    async fn fill_clears_previous_error() {
        let (use_case, store, id) = setup(OrderSide::Buy, 10).await;
        let order = store.get_order(&id).await.unwrap().unwrap();
        let update = OrderUpdate {
            error_message: FieldPatch::Set("venue timeout".to_string()),
            ..OrderUpdate::default()
        };
        store.update_order(&id, order.version(), update, t0()).await.unwrap();

        let FillOutcome::Applied { order, .. } = use_case
            .apply(event(&id, "f1", 10, Money::new(dec!(100))))
            .await
            .unwrap()
        else {
            panic!("expected applied");
        };
        assert_eq!(order.error_message(), None);
        assert_eq!(order.venue_order_id(), Some(&VenueOrderId::new("v-1")));
    }

    #[tokio::test]
    async fn concurrent_fills_for_one_order_both_land() {
        let (use_case, store, id) = setup(OrderSide::Buy, 100).await;
        let use_case = Arc::new(use_case);
        let a = {
            let use_case = use_case.clone();
            let fill = event(&id, "f1", 30, Money::new(dec!(100)));
            tokio::spawn(async move { use_case.apply(fill).await })
        };
        let b = {
            let use_case = use_case.clone();
            let fill = event(&id, "f2", 20, Money::new(dec!(100)));
            tokio::spawn(async move { use_case.apply(fill).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let order = store.get_order(&id).await.unwrap().unwrap();
        assert_eq!(order.filled_quantity(), Quantity::from_i64(50));
    }
}
