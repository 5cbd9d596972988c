//! A single execution against an order.

use serde::{Deserialize, Serialize};

use crate::domain::order_execution::errors::OrderError;
use crate::domain::shared::{FillId, Money, Quantity, Timestamp};

/// An execution reported by the venue (via webhook or reconciliation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    /// Venue execution id, when the venue supplies one.
    pub fill_id: Option<FillId>,
    /// Executed quantity (positive).
    pub quantity: Quantity,
    /// Execution price.
    pub price: Money,
    /// Venue timestamp of the execution.
    pub executed_at: Timestamp,
}

impl Fill {
    /// Create a new fill.
    #[must_use]
    pub const fn new(
        fill_id: Option<FillId>,
        quantity: Quantity,
        price: Money,
        executed_at: Timestamp,
    ) -> Self {
        Self {
            fill_id,
            quantity,
            price,
            executed_at,
        }
    }

    /// Validate quantity and price.
    ///
    /// # Errors
    ///
    /// Returns error if quantity or price is not positive.
    pub fn validate(&self) -> Result<(), OrderError> {
        if !self.quantity.is_positive() {
            return Err(OrderError::invalid(
                "fill_quantity",
                "Fill quantity must be positive",
            ));
        }
        self.price
            .validate_as_price("fill_price")
            .map_err(|e| OrderError::invalid("fill_price", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ts() -> Timestamp {
        Timestamp::parse("2026-01-19T14:30:00Z").unwrap()
    }

    #[test]
    fn valid_fill() {
        let fill = Fill::new(None, Quantity::from_i64(10), Money::new(dec!(99.5)), ts());
        assert!(fill.validate().is_ok());
    }

    #[test]
    fn rejects_zero_quantity_and_price() {
        let zero_qty = Fill::new(None, Quantity::ZERO, Money::new(dec!(1)), ts());
        assert!(zero_qty.validate().is_err());

        let zero_px = Fill::new(None, Quantity::from_i64(1), Money::ZERO, ts());
        assert!(zero_px.validate().is_err());
    }
}
