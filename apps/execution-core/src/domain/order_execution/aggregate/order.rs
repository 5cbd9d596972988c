//! Order Aggregate Root
//!
//! Holds the persisted state of one logical submission. State changes go
//! through `OrderStateMachine`, which returns new values and never mutates
//! an order in place, so a rejected transition leaves the order unchanged.

use serde::{Deserialize, Serialize};

use crate::domain::idempotency::Fingerprint;
use crate::domain::order_execution::value_objects::{
    OrderRequest, OrderSide, OrderStatus, OrderType, OrderUpdate,
};
use crate::domain::shared::{
    ClientOrderId, Money, Quantity, StrategyId, Symbol, Timestamp, VenueOrderId,
};

/// Order Aggregate Root.
///
/// `version` is the optimistic concurrency token: the store bumps it on every
/// successful write and rejects writes carrying a stale value.
#[allow(clippy::struct_field_names)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub(crate) client_order_id: ClientOrderId,
    pub(crate) venue_order_id: Option<VenueOrderId>,
    pub(crate) symbol: Symbol,
    pub(crate) side: OrderSide,
    pub(crate) quantity: Quantity,
    pub(crate) order_type: OrderType,
    pub(crate) limit_price: Option<Money>,
    pub(crate) strategy_id: StrategyId,
    pub(crate) fingerprint: Fingerprint,
    pub(crate) status: OrderStatus,
    pub(crate) filled_quantity: Quantity,
    pub(crate) filled_avg_price: Option<Money>,
    pub(crate) filled_at: Option<Timestamp>,
    pub(crate) error_message: Option<String>,
    pub(crate) created_at: Timestamp,
    pub(crate) updated_at: Timestamp,
    pub(crate) version: u64,
}

impl Order {
    /// Build a `NEW` order from an already validated request.
    pub(crate) fn from_request(
        request: OrderRequest,
        client_order_id: ClientOrderId,
        fingerprint: Fingerprint,
        now: Timestamp,
    ) -> Self {
        Self {
            client_order_id,
            venue_order_id: None,
            symbol: request.symbol,
            side: request.side,
            quantity: request.quantity,
            order_type: request.order_type,
            limit_price: request.limit_price,
            strategy_id: request.strategy_id,
            fingerprint,
            status: OrderStatus::New,
            filled_quantity: Quantity::ZERO,
            filled_avg_price: None,
            filled_at: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    // ========================================================================
    // Getters
    // ========================================================================

    /// Get the client order id.
    #[must_use]
    pub const fn client_order_id(&self) -> &ClientOrderId {
        &self.client_order_id
    }

    /// Get the venue order id, once known.
    #[must_use]
    pub const fn venue_order_id(&self) -> Option<&VenueOrderId> {
        self.venue_order_id.as_ref()
    }

    /// Get the symbol.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Get the order side.
    #[must_use]
    pub const fn side(&self) -> OrderSide {
        self.side
    }

    /// Get the ordered quantity.
    #[must_use]
    pub const fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// Get the order type.
    #[must_use]
    pub const fn order_type(&self) -> OrderType {
        self.order_type
    }

    /// Get the limit price.
    #[must_use]
    pub const fn limit_price(&self) -> Option<Money> {
        self.limit_price
    }

    /// Get the owning strategy.
    #[must_use]
    pub const fn strategy_id(&self) -> &StrategyId {
        &self.strategy_id
    }

    /// Get the submission fingerprint.
    #[must_use]
    pub const fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Get the current status.
    #[must_use]
    pub const fn status(&self) -> OrderStatus {
        self.status
    }

    /// Get the cumulative filled quantity.
    #[must_use]
    pub const fn filled_quantity(&self) -> Quantity {
        self.filled_quantity
    }

    /// Get the quantity still open.
    #[must_use]
    pub fn remaining_quantity(&self) -> Quantity {
        self.quantity - self.filled_quantity
    }

    /// Get the average fill price.
    #[must_use]
    pub const fn filled_avg_price(&self) -> Option<Money> {
        self.filled_avg_price
    }

    /// Get the timestamp of the last fill.
    #[must_use]
    pub const fn filled_at(&self) -> Option<Timestamp> {
        self.filled_at
    }

    /// Get the last error message.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Get the last update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Get the optimistic concurrency version.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    // ========================================================================
    // Persistence merge
    // ========================================================================

    /// Merge a partial update into this order.
    ///
    /// Venue fields are only overwritten by a supplied value; the error
    /// message follows its `FieldPatch`.
    /// Used by stores; lifecycle rules are enforced before an update is built.
    pub fn merge(&mut self, update: OrderUpdate, now: Timestamp) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(venue_order_id) = update.venue_order_id {
            self.venue_order_id = Some(venue_order_id);
        }
        if let Some(filled_quantity) = update.filled_quantity {
            self.filled_quantity = filled_quantity;
        }
        if let Some(price) = update.filled_avg_price {
            self.filled_avg_price = Some(price);
        }
        if let Some(filled_at) = update.filled_at {
            self.filled_at = Some(filled_at);
        }
        update.error_message.apply_to(&mut self.error_message);
        self.updated_at = now;
    }

    /// Advance the version after a successful write.
    pub fn bump_version(&mut self) {
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order_execution::FieldPatch;
    use rust_decimal_macros::dec;

    fn t(secs: i64) -> Timestamp {
        Timestamp::parse("2026-01-19T14:00:00Z").unwrap() + chrono::Duration::seconds(secs)
    }

    fn order() -> Order {
        let request = OrderRequest::limit(
            "AAPL",
            OrderSide::Buy,
            Quantity::from_i64(100),
            Money::new(dec!(150)),
            "s1",
        );
        let fp = Fingerprint::of(&request);
        Order::from_request(request, ClientOrderId::new("ord-1"), fp, t(0))
    }

    #[test]
    fn new_order_defaults() {
        let order = order();
        assert_eq!(order.status(), OrderStatus::New);
        assert_eq!(order.filled_quantity(), Quantity::ZERO);
        assert_eq!(order.remaining_quantity(), Quantity::from_i64(100));
        assert!(order.venue_order_id().is_none());
        assert_eq!(order.version(), 0);
    }

    #[test]
    fn merge_clears_error_but_keeps_venue_id() {
        let mut order = order();
        order.venue_order_id = Some(VenueOrderId::new("v-1"));
        order.error_message = Some("timeout".to_string());

        let update = OrderUpdate {
            status: Some(OrderStatus::Accepted),
            error_message: FieldPatch::Clear,
            ..OrderUpdate::default()
        };
        order.merge(update, t(5));

        assert_eq!(order.status(), OrderStatus::Accepted);
        assert_eq!(order.error_message(), None);
        assert_eq!(order.venue_order_id(), Some(&VenueOrderId::new("v-1")));
        assert_eq!(order.updated_at(), t(5));
    }

    #[test]
    fn merge_preserves_fill_data_when_omitted() {
        let mut order = order();
        order.filled_quantity = Quantity::from_i64(40);
        order.filled_avg_price = Some(Money::new(dec!(149)));

        order.merge(OrderUpdate::default().with_error("late"), t(1));

        assert_eq!(order.filled_quantity(), Quantity::from_i64(40));
        assert_eq!(order.filled_avg_price(), Some(Money::new(dec!(149))));
        assert_eq!(order.error_message(), Some("late"));
    }
}
