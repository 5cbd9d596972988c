//! Cancel Order Use Case
//!
//! A cancel is only recorded locally once the venue confirms it. An order the
//! venue has never seen (`NEW`, no venue id) is canceled locally.

use std::sync::Arc;

use crate::application::context::ExecutionContext;
use crate::application::ports::{OrderLookup, VenueError};
use crate::domain::order_execution::{Order, OrderStateMachine, OrderStatus};
use crate::domain::shared::{ClientOrderId, VenueOrderId};
use crate::error::ExecutionError;

use super::order_writes::{load_order, update_with_retry};

/// Use case for canceling open orders.
#[derive(Debug)]
pub struct CancelOrderUseCase {
    ctx: Arc<ExecutionContext>,
}

impl CancelOrderUseCase {
    /// Create a new `CancelOrderUseCase`.
    #[must_use]
    pub const fn new(ctx: Arc<ExecutionContext>) -> Self {
        Self { ctx }
    }

    /// Cancel an order.
    ///
    /// Returns the stored order after the cancel. If a fill or venue update
    /// made the order terminal while the cancel was in flight, that state is
    /// kept and returned.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the order is unknown locally or at the venue
    /// - `InvalidTransition` if the order is already terminal
    /// - `BrokerRejected` if the venue refuses the cancel
    /// - `BrokerTimeout` / `BrokerUnavailable` if the venue did not answer;
    ///   the order is left unchanged
    pub async fn cancel(&self, id: &ClientOrderId) -> Result<Order, ExecutionError> {
        let order = load_order(&self.ctx, id).await?;
        if !order.status().is_cancelable() {
            return Err(ExecutionError::InvalidTransition(format!(
                "order {id} is {} and cannot be canceled",
                order.status()
            )));
        }

        let venue_order_id = match order.venue_order_id() {
            Some(venue_order_id) => venue_order_id.clone(),
            None if order.status() == OrderStatus::New => {
                tracing::info!(client_order_id = %id, "Canceling unsubmitted order locally");
                return self.record_canceled(id, None).await;
            }
            None => self.locate(id).await?,
        };

        self.ctx
            .venue_call(self.ctx.venue().cancel(&venue_order_id))
            .await
            .map_err(|e| Self::map_venue_error(id, e))?;
        tracing::info!(
            client_order_id = %id,
            venue_order_id = %venue_order_id,
            "Venue confirmed cancel"
        );

        self.record_canceled(id, Some(venue_order_id)).await
    }

    /// Find the venue id of an order whose submission outcome is unknown.
    async fn locate(&self, id: &ClientOrderId) -> Result<VenueOrderId, ExecutionError> {
        let lookup = OrderLookup::Client(id.clone());
        let venue_order = self
            .ctx
            .venue_call(self.ctx.venue().get_order(&lookup))
            .await
            .map_err(|e| Self::map_venue_error(id, e))?;
        Ok(venue_order.venue_order_id)
    }

    async fn record_canceled(
        &self,
        id: &ClientOrderId,
        venue_order_id: Option<VenueOrderId>,
    ) -> Result<Order, ExecutionError> {
        let now = self.ctx.now();
        update_with_retry(&self.ctx, id, |current| {
            if current.status().is_terminal() {
                tracing::warn!(
                    client_order_id = %id,
                    status = %current.status(),
                    "Order reached a terminal status before the cancel was recorded"
                );
                return Ok(None);
            }
            let mut next =
                OrderStateMachine::apply_terminal(current, OrderStatus::Canceled, None, now)?;
            if next.venue_order_id().is_none() {
                next.venue_order_id.clone_from(&venue_order_id);
            }
            Ok(Some(next))
        })
        .await
    }

    fn map_venue_error(id: &ClientOrderId, err: VenueError) -> ExecutionError {
        match err {
            VenueError::Rejected { reason } => ExecutionError::BrokerRejected {
                client_order_id: id.to_string(),
                reason,
            },
            VenueError::Timeout => ExecutionError::BrokerTimeout {
                client_order_id: id.to_string(),
            },
            other => other.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{PersistenceStore, VenueOrderStatus};
    use crate::application::use_cases::{AdmissionControl, SubmitOrderUseCase};
    use crate::config::Config;
    use crate::domain::idempotency::IdempotencyLedger;
    use crate::domain::order_execution::{OrderRequest, OrderSide};
    use crate::domain::shared::{Money, Quantity, Timestamp};
    use crate::infrastructure::venue::SubmitScript;
    use crate::infrastructure::{InMemoryGateStore, InMemoryStore, ManualClock, SimulatedVenue};
    use rust_decimal_macros::dec;

    struct Harness {
        store: Arc<InMemoryStore>,
        venue: Arc<SimulatedVenue>,
        submit: SubmitOrderUseCase,
        cancel: CancelOrderUseCase,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new(
            Timestamp::parse("2026-01-19T14:00:00Z").unwrap(),
        ));
        let store = Arc::new(InMemoryStore::new());
        let venue = Arc::new(SimulatedVenue::new(clock.clone()));
        let ctx = Arc::new(ExecutionContext::new(
            store.clone(),
            venue.clone(),
            Arc::new(InMemoryGateStore::new()),
            clock,
            Config::default(),
        ));
        let admission = Arc::new(AdmissionControl::new(ctx.clone()));
        Harness {
            store,
            venue,
            submit: SubmitOrderUseCase::new(ctx.clone(), admission),
            cancel: CancelOrderUseCase::new(ctx),
        }
    }

    fn request() -> OrderRequest {
        OrderRequest::limit(
            "MSFT",
            OrderSide::Buy,
            Quantity::from_i64(10),
            Money::new(dec!(400)),
            "s1",
        )
    }

    #[tokio::test]
    async fn cancel_after_venue_confirms() {
        let h = harness();
        let submitted = h.submit.submit(request()).await.unwrap();
        let id = submitted.order().client_order_id().clone();

        let canceled = h.cancel.cancel(&id).await.unwrap();

        assert_eq!(canceled.status(), OrderStatus::Canceled);
        assert_eq!(h.venue.calls().cancels(), 1);
    }

    #[tokio::test]
    async fn unsubmitted_order_is_canceled_locally() {
        let h = harness();
        let now = Timestamp::parse("2026-01-19T14:00:00Z").unwrap();
        let order =
            OrderStateMachine::create(request(), ClientOrderId::new("ord-local"), now).unwrap();
        let record = IdempotencyLedger::new(chrono::Duration::hours(1)).record_for(
            order.fingerprint().clone(),
            order.client_order_id().clone(),
            now,
        );
        h.store
            .create_order_with_fingerprint(&order, &record)
            .await
            .unwrap();

        let canceled = h.cancel.cancel(order.client_order_id()).await.unwrap();

        assert_eq!(canceled.status(), OrderStatus::Canceled);
        assert_eq!(h.venue.calls().cancels(), 0);
    }

    #[tokio::test]
    async fn unknown_outcome_order_is_located_by_client_id() {
        let h = harness();
        h.venue.script_submit(SubmitScript::AcceptThenTimeout);
        let err = h.submit.submit(request()).await.unwrap_err();
        assert!(matches!(err, ExecutionError::BrokerTimeout { .. }));

        let order = h.store.list_open_orders().await.unwrap().remove(0);
        assert!(order.venue_order_id().is_none());

        let canceled = h.cancel.cancel(order.client_order_id()).await.unwrap();
        assert_eq!(canceled.status(), OrderStatus::Canceled);
        assert!(canceled.venue_order_id().is_some());
        assert_eq!(h.venue.calls().order_lookups(), 1);
    }

    #[tokio::test]
    async fn terminal_order_cannot_be_canceled() {
        let h = harness();
        let submitted = h.submit.submit(request()).await.unwrap();
        let id = submitted.order().client_order_id().clone();
        h.cancel.cancel(&id).await.unwrap();

        let err = h.cancel.cancel(&id).await.unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn venue_outage_leaves_order_open() {
        let h = harness();
        let submitted = h.submit.submit(request()).await.unwrap();
        let id = submitted.order().client_order_id().clone();
        h.venue.set_unavailable(true);

        let err = h.cancel.cancel(&id).await.unwrap_err();

        assert!(matches!(err, ExecutionError::BrokerUnavailable(_)));
        let order = h.store.get_order(&id).await.unwrap().unwrap();
        assert_eq!(order.status(), OrderStatus::SubmittedUnconfirmed);
    }

    #[tokio::test]
    async fn venue_refusal_is_broker_rejected() {
        let h = harness();
        let submitted = h.submit.submit(request()).await.unwrap();
        let order = submitted.order().clone();
        let lookup = OrderLookup::for_order(&order);
        h.venue
            .set_status(&lookup, VenueOrderStatus::Filled, None)
            .unwrap();

        let err = h.cancel.cancel(order.client_order_id()).await.unwrap_err();
        assert!(matches!(err, ExecutionError::BrokerRejected { .. }));
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let h = harness();
        let err = h
            .cancel
            .cancel(&ClientOrderId::new("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::NotFound(_)));
    }
}
