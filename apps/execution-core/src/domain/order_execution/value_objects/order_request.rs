//! Order submission request.

use serde::{Deserialize, Serialize};

use super::{OrderSide, OrderType};
use crate::domain::order_execution::errors::OrderError;
use crate::domain::shared::{Money, Quantity, StrategyId, Symbol};

/// A request to submit a new order.
///
/// Limit price is required for limit orders and forbidden for market orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Symbol to trade.
    pub symbol: Symbol,
    /// Order side.
    pub side: OrderSide,
    /// Quantity to trade (always positive).
    pub quantity: Quantity,
    /// Order type.
    pub order_type: OrderType,
    /// Limit price (limit orders only).
    #[serde(default)]
    pub limit_price: Option<Money>,
    /// Strategy that owns the order.
    pub strategy_id: StrategyId,
}

impl OrderRequest {
    /// Create a market order request.
    #[must_use]
    pub fn market(
        symbol: impl Into<Symbol>,
        side: OrderSide,
        quantity: Quantity,
        strategy_id: impl Into<StrategyId>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            order_type: OrderType::Market,
            limit_price: None,
            strategy_id: strategy_id.into(),
        }
    }

    /// Create a limit order request.
    #[must_use]
    pub fn limit(
        symbol: impl Into<Symbol>,
        side: OrderSide,
        quantity: Quantity,
        limit_price: Money,
        strategy_id: impl Into<StrategyId>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            order_type: OrderType::Limit,
            limit_price: Some(limit_price),
            strategy_id: strategy_id.into(),
        }
    }

    /// Validate the request parameters.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::InvalidParameters` naming the first bad field.
    pub fn validate(&self) -> Result<(), OrderError> {
        self.symbol
            .validate()
            .map_err(|e| OrderError::invalid("symbol", e.to_string()))?;

        self.quantity
            .validate_for_order()
            .map_err(|e| OrderError::invalid("quantity", e.to_string()))?;

        match (self.order_type.requires_limit_price(), self.limit_price) {
            (true, None) => {
                return Err(OrderError::invalid(
                    "limit_price",
                    "Limit price required for limit orders",
                ));
            }
            (false, Some(_)) => {
                return Err(OrderError::invalid(
                    "limit_price",
                    "Limit price not allowed for market orders",
                ));
            }
            (true, Some(price)) => {
                price
                    .validate_as_price("limit_price")
                    .map_err(|e| OrderError::invalid("limit_price", e.to_string()))?;
            }
            (false, None) => {}
        }

        if self.strategy_id.as_str().trim().is_empty() {
            return Err(OrderError::invalid(
                "strategy_id",
                "Strategy id cannot be empty",
            ));
        }

        Ok(())
    }
}
