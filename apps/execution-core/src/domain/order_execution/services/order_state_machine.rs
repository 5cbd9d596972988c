//! Order State Machine Service
//!
//! Owns the order lifecycle graph and applies transitions.
//!
//! Every operation takes the current order by reference and returns the next
//! value. On error nothing is returned, so the caller's order is unchanged
//! and the error reports which edge was refused.

use rust_decimal::Decimal;

use crate::domain::idempotency::Fingerprint;
use crate::domain::order_execution::aggregate::Order;
use crate::domain::order_execution::errors::OrderError;
use crate::domain::order_execution::value_objects::{Fill, OrderRequest, OrderStatus};
use crate::domain::shared::{ClientOrderId, Money, Timestamp, VenueOrderId};

/// Order State Machine for validating and applying transitions.
pub struct OrderStateMachine;

impl OrderStateMachine {
    /// Check if a state transition is valid.
    #[must_use]
    pub const fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
        use OrderStatus::{
            Accepted, Canceled, Expired, Failed, Filled, New, PartiallyFilled, Rejected,
            SubmittedUnconfirmed,
        };
        matches!(
            (from, to),
            // From New
            (New, SubmittedUnconfirmed | Rejected | Failed | Canceled)
                // From SubmittedUnconfirmed
                | (SubmittedUnconfirmed, Accepted | Rejected | Failed | Canceled | Expired)
                // From Accepted
                | (Accepted, PartiallyFilled | Filled | Canceled | Rejected | Expired)
                // From PartiallyFilled
                | (PartiallyFilled, PartiallyFilled | Filled | Canceled | Expired)
        )
    }

    /// Validate a state transition.
    ///
    /// # Errors
    ///
    /// Returns error if the transition is invalid.
    pub fn validate_transition(from: OrderStatus, to: OrderStatus) -> Result<(), OrderError> {
        if Self::is_valid_transition(from, to) {
            Ok(())
        } else {
            Err(OrderError::InvalidStateTransition {
                from,
                to,
                reason: Self::transition_error_reason(from, to),
            })
        }
    }

    /// Get a human-readable reason for an invalid transition.
    #[must_use]
    pub fn transition_error_reason(from: OrderStatus, to: OrderStatus) -> String {
        match from {
            OrderStatus::Filled => format!("Order is already filled, cannot transition to {to}"),
            OrderStatus::Canceled => format!("Order is canceled, cannot transition to {to}"),
            OrderStatus::Rejected => format!("Order was rejected, cannot transition to {to}"),
            OrderStatus::Failed => format!("Order has failed, cannot transition to {to}"),
            OrderStatus::Expired => format!("Order has expired, cannot transition to {to}"),
            _ => format!("Invalid transition from {from} to {to}"),
        }
    }

    /// Get all valid next states from a given state.
    #[must_use]
    pub fn valid_next_states(from: OrderStatus) -> Vec<OrderStatus> {
        OrderStatus::ALL
            .into_iter()
            .filter(|to| Self::is_valid_transition(from, *to))
            .collect()
    }

    // ========================================================================
    // Lifecycle operations
    // ========================================================================

    /// Create a `NEW` order from a submission request.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::InvalidParameters` for a malformed request.
    pub fn create(
        request: OrderRequest,
        client_order_id: ClientOrderId,
        now: Timestamp,
    ) -> Result<Order, OrderError> {
        request.validate()?;
        let fingerprint = Fingerprint::of(&request);
        Ok(Order::from_request(
            request,
            client_order_id,
            fingerprint,
            now,
        ))
    }

    /// Record that the submission was handed to the venue.
    ///
    /// `venue_order_id` is `None` when the venue call's outcome is unknown
    /// (timeout); reconciliation resolves those by client order id.
    ///
    /// # Errors
    ///
    /// Returns error unless the order is `NEW`.
    pub fn mark_submitted(
        order: &Order,
        venue_order_id: Option<VenueOrderId>,
        now: Timestamp,
    ) -> Result<Order, OrderError> {
        let mut next = order.clone();
        Self::transition(&mut next, OrderStatus::SubmittedUnconfirmed)?;
        if venue_order_id.is_some() {
            next.venue_order_id = venue_order_id;
        }
        next.updated_at = now;
        Ok(next)
    }

    /// Record the venue's acknowledgement (`ACCEPTED`).
    ///
    /// A `NEW` order first passes through `SUBMITTED_UNCONFIRMED`, which
    /// happens when the venue confirms before the submitting call recorded
    /// its own result. A previous error message is cleared.
    ///
    /// # Errors
    ///
    /// Returns error unless the order is `NEW` or `SUBMITTED_UNCONFIRMED`.
    pub fn acknowledge(
        order: &Order,
        venue_order_id: Option<VenueOrderId>,
        now: Timestamp,
    ) -> Result<Order, OrderError> {
        if !order.status.is_unconfirmed() {
            return Err(OrderError::InvalidStateTransition {
                from: order.status,
                to: OrderStatus::Accepted,
                reason: Self::transition_error_reason(order.status, OrderStatus::Accepted),
            });
        }
        let mut next = order.clone();
        Self::walk_to_accepted(&mut next)?;
        if venue_order_id.is_some() {
            next.venue_order_id = venue_order_id;
        }
        next.error_message = None;
        next.updated_at = now;
        Ok(next)
    }

    /// Apply a fill, moving to `PARTIALLY_FILLED` or `FILLED`.
    ///
    /// Unacknowledged orders are acknowledged first so the observed status
    /// path stays inside the graph. Position P&L is handled separately by
    /// `PositionAccount`.
    ///
    /// # Errors
    ///
    /// Returns `CannotFill` for terminal orders (see
    /// [`Self::record_late_fill`]) and `FillExceedsRemaining` on overfill.
    pub fn apply_fill(order: &Order, fill: &Fill, now: Timestamp) -> Result<Order, OrderError> {
        fill.validate()?;
        if !order.status.can_fill() {
            return Err(OrderError::CannotFill {
                status: order.status,
            });
        }
        Self::ensure_within_remaining(order, fill)?;

        let mut next = order.clone();
        Self::walk_to_accepted(&mut next)?;
        Self::accumulate_fill(&mut next, fill);

        let target = if next.filled_quantity >= next.quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        Self::transition(&mut next, target)?;
        next.error_message = None;
        next.updated_at = now;
        Ok(next)
    }

    /// Record a fill that arrived after the order reached a terminal state.
    ///
    /// Executions are never dropped: quantities are updated but the status
    /// stays terminal. Callers report these for review.
    ///
    /// # Errors
    ///
    /// Returns error if the order is not terminal or the fill overfills it.
    pub fn record_late_fill(
        order: &Order,
        fill: &Fill,
        now: Timestamp,
    ) -> Result<Order, OrderError> {
        fill.validate()?;
        if !order.status.is_terminal() {
            return Err(OrderError::InvalidParameters {
                field: "status".to_string(),
                message: format!("late fill requires a terminal order, got {}", order.status),
            });
        }
        Self::ensure_within_remaining(order, fill)?;

        let mut next = order.clone();
        Self::accumulate_fill(&mut next, fill);
        next.error_message = Some(format!(
            "fill of {} received after order was {}",
            fill.quantity, order.status
        ));
        next.updated_at = now;
        Ok(next)
    }

    /// Move an order to `CANCELED`, `REJECTED`, `FAILED` or `EXPIRED`.
    ///
    /// `reason` is stored as the error message when supplied.
    ///
    /// # Errors
    ///
    /// Returns error if `status` is not one of those four or the edge is not
    /// in the graph.
    pub fn apply_terminal(
        order: &Order,
        status: OrderStatus,
        reason: Option<&str>,
        now: Timestamp,
    ) -> Result<Order, OrderError> {
        if !status.is_terminal() || status == OrderStatus::Filled {
            return Err(OrderError::InvalidParameters {
                field: "status".to_string(),
                message: format!("{status} is not a terminal status reachable without fills"),
            });
        }

        let mut next = order.clone();
        Self::transition(&mut next, status)?;
        if let Some(reason) = reason {
            next.error_message = Some(reason.to_string());
        }
        next.updated_at = now;
        Ok(next)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn transition(order: &mut Order, to: OrderStatus) -> Result<(), OrderError> {
        Self::validate_transition(order.status, to)?;
        order.status = to;
        Ok(())
    }

    fn walk_to_accepted(order: &mut Order) -> Result<(), OrderError> {
        if order.status == OrderStatus::New {
            Self::transition(order, OrderStatus::SubmittedUnconfirmed)?;
        }
        if order.status == OrderStatus::SubmittedUnconfirmed {
            Self::transition(order, OrderStatus::Accepted)?;
        }
        match order.status {
            OrderStatus::Accepted | OrderStatus::PartiallyFilled => Ok(()),
            other => Err(OrderError::InvalidStateTransition {
                from: other,
                to: OrderStatus::Accepted,
                reason: Self::transition_error_reason(other, OrderStatus::Accepted),
            }),
        }
    }

    fn ensure_within_remaining(order: &Order, fill: &Fill) -> Result<(), OrderError> {
        let remaining = order.remaining_quantity();
        if fill.quantity > remaining {
            return Err(OrderError::FillExceedsRemaining {
                fill_qty: fill.quantity.to_string(),
                remaining_qty: remaining.to_string(),
            });
        }
        Ok(())
    }

    fn accumulate_fill(order: &mut Order, fill: &Fill) {
        let prev_qty = order.filled_quantity.amount();
        let prev_avg = order.filled_avg_price.map_or(Decimal::ZERO, |m| m.amount());
        let new_qty = prev_qty + fill.quantity.amount();
        let avg = (prev_avg * prev_qty + fill.price.amount() * fill.quantity.amount()) / new_qty;

        order.filled_quantity = new_qty.into();
        order.filled_avg_price = Some(Money::new(avg));
        order.filled_at = Some(fill.executed_at);
    }
}
