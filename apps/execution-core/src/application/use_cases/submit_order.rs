//! Submit Order Use Case
//!
//! ```text
//! may_submit ─► validate ─► fingerprint lookup ─► create (unique fingerprint)
//!                                  │                        │
//!                              duplicate ◄──── lost race ───┘
//!                                                           ▼
//!                                                     venue.submit
//!                     ack ─► SUBMITTED_UNCONFIRMED(venue id)
//!                 timeout ─► SUBMITTED_UNCONFIRMED(no id) + error, fingerprint kept
//!                rejected ─► REJECTED(reason), fingerprint kept
//!            rate limited ─► FAILED, fingerprint released
//! ```
//!
//! A venue call whose outcome is unknown is never retried here. The caller
//! may resubmit the same request; the fingerprint resolves it to the same
//! order and reconciliation settles what the venue actually did.

use std::sync::Arc;

use serde::Serialize;

use super::AdmissionControl;
use crate::application::context::ExecutionContext;
use crate::application::ports::{
    OrderUpdate, PersistenceError, VenueError, VenueOrder, VenueOrderRequest,
};
use crate::domain::admission::AdmissionDecision;
use crate::domain::idempotency::{Fingerprint, IdempotencyLedger};
use crate::domain::order_execution::{Order, OrderRequest, OrderStateMachine, OrderStatus};
use crate::domain::shared::ClientOrderId;
use crate::error::ExecutionError;

/// Result of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "order", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// A new order was created and handed to the venue.
    Created(Order),
    /// An identical request inside the idempotency window already exists.
    Duplicate(Order),
}

impl SubmitOutcome {
    /// The order either way.
    #[must_use]
    pub const fn order(&self) -> &Order {
        match self {
            Self::Created(order) | Self::Duplicate(order) => order,
        }
    }

    /// Returns true if no new order was created.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

/// Use case for submitting orders to the venue.
#[derive(Debug)]
pub struct SubmitOrderUseCase {
    ctx: Arc<ExecutionContext>,
    admission: Arc<AdmissionControl>,
}

impl SubmitOrderUseCase {
    /// Create a new `SubmitOrderUseCase`.
    #[must_use]
    pub const fn new(ctx: Arc<ExecutionContext>, admission: Arc<AdmissionControl>) -> Self {
        Self { ctx, admission }
    }

    /// Submit an order request.
    ///
    /// # Errors
    ///
    /// - `AdmissionDenied` before anything is read or written
    /// - `Validation` for a malformed request
    /// - `BrokerTimeout` / `BrokerUnavailable` when the venue outcome is unknown
    /// - `BrokerRejected` when the venue refused the order
    /// - `Persistence` on store failure
    pub async fn submit(&self, request: OrderRequest) -> Result<SubmitOutcome, ExecutionError> {
        if let AdmissionDecision::Denied(reason) = self.admission.may_submit().await {
            tracing::warn!(symbol = %request.symbol, %reason, "Order refused by admission control");
            return Err(ExecutionError::AdmissionDenied(reason));
        }
        request.validate()?;

        let now = self.ctx.now();
        let ledger = IdempotencyLedger::new(self.ctx.config().submission.idempotency_window());
        let fingerprint = Fingerprint::of(&request);

        let existing = self
            .ctx
            .store_call(self.ctx.store().find_idempotency_record(&fingerprint))
            .await?;
        if let Some(prior) = ledger.resolve(existing.as_ref(), now) {
            return self.duplicate(&fingerprint, &prior).await;
        }

        let order = OrderStateMachine::create(request, ClientOrderId::generate(), now)?;
        let record = ledger.record_for(fingerprint.clone(), order.client_order_id().clone(), now);
        let created = match self
            .ctx
            .store_call(self.ctx.store().create_order_with_fingerprint(&order, &record))
            .await
        {
            Ok(created) => created,
            Err(PersistenceError::DuplicateFingerprint { existing, .. }) => {
                return self.duplicate(&fingerprint, &existing).await;
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            client_order_id = %created.client_order_id(),
            symbol = %created.symbol(),
            side = %created.side(),
            quantity = %created.quantity(),
            order_type = %created.order_type(),
            strategy_id = %created.strategy_id(),
            "Order created"
        );

        match self.send(&created).await {
            Ok(ack) => self.on_ack(&created, ack).await,
            Err(e) => self.on_venue_error(&created, e).await,
        }
    }

    async fn send(&self, order: &Order) -> Result<VenueOrder, VenueError> {
        let request = VenueOrderRequest::from_order(order);
        self.ctx
            .venue_call(self.ctx.venue().submit(request))
            .await
    }

    async fn duplicate(
        &self,
        fingerprint: &Fingerprint,
        id: &ClientOrderId,
    ) -> Result<SubmitOutcome, ExecutionError> {
        let order = super::order_writes::load_order(&self.ctx, id).await?;
        tracing::info!(
            client_order_id = %id,
            %fingerprint,
            status = %order.status(),
            "Duplicate submission resolved to existing order"
        );
        Ok(SubmitOutcome::Duplicate(order))
    }

    async fn on_ack(&self, created: &Order, ack: VenueOrder) -> Result<SubmitOutcome, ExecutionError> {
        self.admission.record_venue_success();
        let now = self.ctx.now();

        let mut next =
            OrderStateMachine::mark_submitted(created, Some(ack.venue_order_id.clone()), now)?;
        if let Some(status) = ack.status.terminal_status() {
            next = OrderStateMachine::apply_terminal(&next, status, ack.reject_reason.as_deref(), now)?;
        }

        let update = OrderUpdate::between(created, &next);
        match self
            .ctx
            .store_call(self.ctx.store().update_order(
                created.client_order_id(),
                created.version(),
                update,
                now,
            ))
            .await
        {
            Ok(stored) => {
                tracing::info!(
                    client_order_id = %stored.client_order_id(),
                    venue_order_id = %ack.venue_order_id,
                    status = %stored.status(),
                    "Order submitted"
                );
                if stored.status() == OrderStatus::Rejected {
                    return Err(ExecutionError::BrokerRejected {
                        client_order_id: stored.client_order_id().to_string(),
                        reason: stored.error_message().unwrap_or_default().to_string(),
                    });
                }
                Ok(SubmitOutcome::Created(stored))
            }
            Err(e) => {
                // The venue has the order; reconciliation picks up the NEW row
                // after the grace period and looks it up by client order id.
                tracing::error!(
                    client_order_id = %created.client_order_id(),
                    venue_order_id = %ack.venue_order_id,
                    error = %e,
                    "Venue accepted order but local update failed"
                );
                Err(e.into())
            }
        }
    }

    async fn on_venue_error(
        &self,
        created: &Order,
        error: VenueError,
    ) -> Result<SubmitOutcome, ExecutionError> {
        let id = created.client_order_id();
        let now = self.ctx.now();

        match error {
            VenueError::Rejected { reason } => {
                self.admission.record_venue_success();
                let next = OrderStateMachine::apply_terminal(
                    created,
                    OrderStatus::Rejected,
                    Some(&reason),
                    now,
                )?;
                self.persist_after_venue(created, &next).await;
                tracing::warn!(client_order_id = %id, %reason, "Order rejected by venue");
                Err(ExecutionError::BrokerRejected {
                    client_order_id: id.to_string(),
                    reason,
                })
            }
            VenueError::RateLimited => {
                self.admission.record_venue_failure(&error.to_string()).await;
                let next = OrderStateMachine::apply_terminal(
                    created,
                    OrderStatus::Failed,
                    Some("rate limited by venue before acceptance"),
                    now,
                )?;
                if self.persist_after_venue(created, &next).await {
                    self.release_fingerprint(created).await;
                }
                tracing::warn!(client_order_id = %id, "Order refused by venue rate limit");
                Err(ExecutionError::BrokerUnavailable(error.to_string()))
            }
            VenueError::Timeout | VenueError::Unavailable { .. } | VenueError::NotFound { .. } => {
                self.admission.record_venue_failure(&error.to_string()).await;
                let next = OrderStateMachine::mark_submitted(created, None, now)?;
                let mut pending = next.clone();
                pending.error_message = Some(error.to_string());
                self.persist_after_venue(created, &pending).await;

                tracing::warn!(
                    client_order_id = %id,
                    error = %error,
                    "Venue outcome unknown, left for reconciliation"
                );
                if error == VenueError::Timeout {
                    Err(ExecutionError::BrokerTimeout {
                        client_order_id: id.to_string(),
                    })
                } else {
                    Err(ExecutionError::BrokerUnavailable(error.to_string()))
                }
            }
        }
    }

    /// Persist the post-venue state. Failures are logged; reconciliation
    /// resolves the order from the venue's view.
    async fn persist_after_venue(&self, before: &Order, after: &Order) -> bool {
        let update = OrderUpdate::between(before, after);
        let result = self
            .ctx
            .store_call(self.ctx.store().update_order(
                before.client_order_id(),
                before.version(),
                update,
                self.ctx.now(),
            ))
            .await;
        if let Err(e) = &result {
            tracing::error!(
                client_order_id = %before.client_order_id(),
                status = %after.status(),
                error = %e,
                "Failed to record venue outcome"
            );
        }
        result.is_ok()
    }

    async fn release_fingerprint(&self, order: &Order) {
        if let Err(e) = self
            .ctx
            .store_call(
                self.ctx
                    .store()
                    .release_fingerprint(order.fingerprint(), order.client_order_id()),
            )
            .await
        {
            tracing::error!(
                client_order_id = %order.client_order_id(),
                error = %e,
                "Failed to release fingerprint"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{
        BrokerVenuePort, OrderLookup, PersistenceStore, VenueOrderStatus,
    };
    use crate::config::Config;
    use crate::domain::admission::{DenialReason, TripReason};
    use crate::domain::order_execution::OrderSide;
    use crate::domain::shared::{Money, Quantity, Timestamp};
    use crate::infrastructure::venue::SubmitScript;
    use crate::infrastructure::{InMemoryGateStore, InMemoryStore, ManualClock, SimulatedVenue};
    use rust_decimal_macros::dec;

    struct Harness {
        store: Arc<InMemoryStore>,
        venue: Arc<SimulatedVenue>,
        gates: Arc<InMemoryGateStore>,
        clock: Arc<ManualClock>,
        admission: Arc<AdmissionControl>,
        submit: SubmitOrderUseCase,
    }

    fn harness_with(config: Config) -> Harness {
        let clock = Arc::new(ManualClock::new(
            Timestamp::parse("2026-01-19T14:00:00Z").unwrap(),
        ));
        let store = Arc::new(InMemoryStore::new());
        let venue = Arc::new(SimulatedVenue::new(clock.clone()));
        let gates = Arc::new(InMemoryGateStore::new());
        let ctx = Arc::new(ExecutionContext::new(
            store.clone(),
            venue.clone(),
            gates.clone(),
            clock.clone(),
            config,
        ));
        let admission = Arc::new(AdmissionControl::new(ctx.clone()));
        Harness {
            store,
            venue,
            gates,
            clock,
            admission: admission.clone(),
            submit: SubmitOrderUseCase::new(ctx, admission),
        }
    }

    fn harness() -> Harness {
        harness_with(Config::default())
    }

    fn limit_buy() -> OrderRequest {
        OrderRequest::limit(
            "AAPL",
            OrderSide::Buy,
            Quantity::from_i64(100),
            Money::new(dec!(150)),
            "momentum",
        )
    }

    #[tokio::test]
    async fn accepted_submission_is_unconfirmed_with_venue_id() {
        let h = harness();
        let outcome = h.submit.submit(limit_buy()).await.unwrap();

        let order = outcome.order();
        assert!(!outcome.is_duplicate());
        assert_eq!(order.status(), OrderStatus::SubmittedUnconfirmed);
        assert!(order.venue_order_id().is_some());
        assert_eq!(h.venue.calls().submits(), 1);
    }

    #[tokio::test]
    async fn identical_request_returns_same_order_without_venue_call() {
        let h = harness();
        let first = h.submit.submit(limit_buy()).await.unwrap();
        let second = h.submit.submit(limit_buy()).await.unwrap();

        assert!(second.is_duplicate());
        assert_eq!(
            first.order().client_order_id(),
            second.order().client_order_id()
        );
        assert_eq!(h.venue.calls().submits(), 1);
    }

    #[tokio::test]
    async fn different_strategy_is_still_a_duplicate() {
        let h = harness();
        h.submit.submit(limit_buy()).await.unwrap();
        let mut other = limit_buy();
        other.strategy_id = "mean-reversion".into();
        assert!(h.submit.submit(other).await.unwrap().is_duplicate());
    }

    #[tokio::test]
    async fn expired_window_creates_a_new_order() {
        let h = harness();
        let first = h.submit.submit(limit_buy()).await.unwrap();
        h.clock.advance(chrono::Duration::days(2));
        let second = h.submit.submit(limit_buy()).await.unwrap();

        assert!(!second.is_duplicate());
        assert_ne!(
            first.order().client_order_id(),
            second.order().client_order_id()
        );
        assert_eq!(h.venue.calls().submits(), 2);
    }

    #[tokio::test]
    async fn timeout_keeps_fingerprint_and_retry_returns_same_order() {
        let h = harness();
        h.venue.script_submit(SubmitScript::AcceptThenTimeout);

        let err = h.submit.submit(limit_buy()).await.unwrap_err();
        assert!(matches!(err, ExecutionError::BrokerTimeout { .. }));
        assert!(err.is_retryable());

        let retry = h.submit.submit(limit_buy()).await.unwrap();
        assert!(retry.is_duplicate());
        assert_eq!(retry.order().status(), OrderStatus::SubmittedUnconfirmed);
        assert!(retry.order().venue_order_id().is_none());
        assert!(retry.order().error_message().is_some());
        assert_eq!(h.venue.calls().submits(), 1);
    }

    #[tokio::test]
    async fn rejection_records_reason() {
        let h = harness();
        h.venue.script_submit(SubmitScript::Fail(VenueError::Rejected {
            reason: "insufficient buying power".to_string(),
        }));

        let err = h.submit.submit(limit_buy()).await.unwrap_err();
        let ExecutionError::BrokerRejected {
            client_order_id,
            reason,
        } = err
        else {
            panic!("expected rejection, got {err:?}");
        };
        assert_eq!(reason, "insufficient buying power");

        let stored = h
            .store
            .get_order(&ClientOrderId::new(client_order_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status(), OrderStatus::Rejected);
        assert_eq!(stored.error_message(), Some("insufficient buying power"));
    }

    #[tokio::test]
    async fn rate_limit_fails_order_and_frees_fingerprint() {
        let h = harness();
        h.venue
            .script_submit(SubmitScript::Fail(VenueError::RateLimited));

        let err = h.submit.submit(limit_buy()).await.unwrap_err();
        assert!(matches!(err, ExecutionError::BrokerUnavailable(_)));

        let retry = h.submit.submit(limit_buy()).await.unwrap();
        assert!(!retry.is_duplicate());
        assert_eq!(h.venue.calls().submits(), 2);
    }

    #[tokio::test]
    async fn denied_before_any_write() {
        let h = harness();
        h.admission
            .trip_circuit_breaker(TripReason::MaxDrawdown, None)
            .await
            .unwrap();

        let err = h.submit.submit(limit_buy()).await.unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::AdmissionDenied(DenialReason::CircuitBreakerTripped {
                reason: TripReason::MaxDrawdown,
                ..
            })
        ));
        assert_eq!(h.store.order_count(), 0);
        assert_eq!(h.venue.calls().submits(), 0);
    }

    #[tokio::test]
    async fn gate_outage_denies() {
        let h = harness();
        h.gates.set_unavailable(true);
        let err = h.submit.submit(limit_buy()).await.unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::AdmissionDenied);
    }

    #[tokio::test]
    async fn invalid_request_is_a_validation_error() {
        let h = harness();
        let mut request = limit_buy();
        request.limit_price = None;
        let err = h.submit.submit(request).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Validation(_)));
        assert_eq!(h.store.order_count(), 0);
    }

    #[tokio::test]
    async fn failed_post_ack_write_leaves_order_new() {
        let h = harness();
        h.store.set_fail_order_updates(true);

        let err = h.submit.submit(limit_buy()).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Persistence(_)));
        h.store.set_fail_order_updates(false);

        let open = h.store.list_open_orders().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].status(), OrderStatus::New);
        let at_venue = h
            .venue
            .get_order(&OrderLookup::Client(open[0].client_order_id().clone()))
            .await
            .unwrap();
        assert_eq!(at_venue.status, VenueOrderStatus::Accepted);
    }

    #[tokio::test]
    async fn repeated_venue_failures_trip_breaker() {
        let mut config = Config::default();
        config.admission.broker_error_threshold = 2;
        let h = harness_with(config);
        h.venue.set_unavailable(true);

        let mut request = limit_buy();
        assert!(h.submit.submit(request.clone()).await.is_err());
        request.quantity = Quantity::from_i64(101);
        assert!(h.submit.submit(request.clone()).await.is_err());
        request.quantity = Quantity::from_i64(102);

        let err = h.submit.submit(request).await.unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::AdmissionDenied(DenialReason::CircuitBreakerTripped {
                reason: TripReason::BrokerErrors,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn concurrent_identical_submissions_create_one_order() {
        let h = harness();
        let submit = Arc::new(h.submit);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let submit = submit.clone();
            handles.push(tokio::spawn(async move { submit.submit(limit_buy()).await }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().order().client_order_id().clone());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(h.venue.calls().submits(), 1);
        assert_eq!(h.store.order_count(), 1);
    }
}
