//! REST venue request and response types.
//!
//! Numbers travel as strings on the wire, the way most broker REST APIs
//! encode decimals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::HttpVenueError;
use crate::application::ports::{
    VenueFill, VenueOrder, VenueOrderRequest, VenueOrderStatus, VenuePosition,
};
use crate::domain::order_execution::OrderSide;
use crate::domain::shared::{
    ClientOrderId, FillId, Money, Quantity, Symbol, Timestamp, VenueOrderId,
};

// ============================================================================
// Order Types
// ============================================================================

/// Order placement body.
#[derive(Debug, Clone, Serialize)]
pub struct ApiOrderRequest {
    /// Symbol.
    pub symbol: String,
    /// Quantity.
    pub qty: String,
    /// `buy` or `sell`.
    pub side: &'static str,
    /// `market` or `limit`.
    #[serde(rename = "type")]
    pub order_type: &'static str,
    /// Orders live for the trading day.
    pub time_in_force: &'static str,
    /// Limit price (limit orders only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<String>,
    /// Client order id.
    pub client_order_id: String,
}

impl From<&VenueOrderRequest> for ApiOrderRequest {
    fn from(request: &VenueOrderRequest) -> Self {
        Self {
            symbol: request.symbol.to_string(),
            qty: request.quantity.to_string(),
            side: request.side.as_str(),
            order_type: request.order_type.as_str(),
            time_in_force: "day",
            limit_price: request.limit_price.map(|p| p.to_string()),
            client_order_id: request.client_order_id.to_string(),
        }
    }
}

/// Order as returned by the venue.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiOrder {
    /// Venue order id.
    pub id: String,
    /// Client order id.
    pub client_order_id: String,
    /// Venue status string.
    pub status: String,
    /// Filled quantity.
    #[serde(default)]
    pub filled_qty: Option<String>,
    /// Average fill price.
    #[serde(default)]
    pub filled_avg_price: Option<String>,
    /// Rejection reason.
    #[serde(default)]
    pub reject_reason: Option<String>,
    /// Last update.
    pub updated_at: String,
}

impl ApiOrder {
    /// Convert to the port type.
    ///
    /// # Errors
    ///
    /// Returns error on an unparseable number or timestamp.
    pub fn into_venue_order(self) -> Result<VenueOrder, HttpVenueError> {
        Ok(VenueOrder {
            venue_order_id: VenueOrderId::new(self.id),
            client_order_id: ClientOrderId::new(self.client_order_id),
            status: parse_order_status(&self.status),
            filled_quantity: self
                .filled_qty
                .as_deref()
                .map(parse_decimal)
                .transpose()?
                .map_or(Quantity::ZERO, Quantity::new),
            filled_avg_price: self
                .filled_avg_price
                .as_deref()
                .map(parse_decimal)
                .transpose()?
                .map(Money::new),
            reject_reason: self.reject_reason,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

// ============================================================================
// Fill Activity Types
// ============================================================================

/// One fill activity.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiFillActivity {
    /// Execution id.
    pub id: String,
    /// Venue order id.
    pub order_id: String,
    /// Client order id.
    #[serde(default)]
    pub client_order_id: Option<String>,
    /// Symbol.
    pub symbol: String,
    /// `buy` or `sell`.
    pub side: String,
    /// Executed quantity.
    pub qty: String,
    /// Execution price.
    pub price: String,
    /// Execution time.
    pub transaction_time: String,
}

impl ApiFillActivity {
    /// Convert to the port type.
    ///
    /// # Errors
    ///
    /// Returns error on an unknown side or an unparseable field.
    pub fn into_venue_fill(self) -> Result<VenueFill, HttpVenueError> {
        let side = match self.side.to_lowercase().as_str() {
            "buy" => OrderSide::Buy,
            "sell" | "sell_short" => OrderSide::Sell,
            other => {
                return Err(HttpVenueError::JsonParse(format!("unknown side '{other}'")));
            }
        };
        Ok(VenueFill {
            fill_id: FillId::new(self.id),
            venue_order_id: VenueOrderId::new(self.order_id),
            client_order_id: self.client_order_id.map(ClientOrderId::new),
            symbol: Symbol::new(self.symbol),
            side,
            quantity: Quantity::new(parse_decimal(&self.qty)?),
            price: Money::new(parse_decimal(&self.price)?),
            executed_at: parse_timestamp(&self.transaction_time)?,
        })
    }
}

// ============================================================================
// Position Types
// ============================================================================

/// Net position; `qty` is negative for shorts.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiPosition {
    /// Symbol.
    pub symbol: String,
    /// Signed quantity.
    pub qty: String,
}

impl ApiPosition {
    /// Convert to the port type.
    ///
    /// # Errors
    ///
    /// Returns error on an unparseable quantity.
    pub fn into_venue_position(self) -> Result<VenuePosition, HttpVenueError> {
        Ok(VenuePosition {
            symbol: Symbol::new(self.symbol),
            quantity: Quantity::new(parse_decimal(&self.qty)?),
        })
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// Error code.
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    /// Error message.
    pub message: String,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_decimal(value: &str) -> Result<Decimal, HttpVenueError> {
    value
        .parse()
        .map_err(|e| HttpVenueError::JsonParse(format!("bad decimal '{value}': {e}")))
}

fn parse_timestamp(value: &str) -> Result<Timestamp, HttpVenueError> {
    Timestamp::parse(value)
        .map_err(|e| HttpVenueError::JsonParse(format!("bad timestamp '{value}': {e}")))
}

/// Map a venue status string onto the port enum.
fn parse_order_status(status: &str) -> VenueOrderStatus {
    match status.to_lowercase().as_str() {
        "accepted" | "accepted_for_bidding" | "replaced" | "pending_replace"
        | "pending_cancel" => VenueOrderStatus::Accepted,
        "partially_filled" => VenueOrderStatus::PartiallyFilled,
        "filled" => VenueOrderStatus::Filled,
        "done_for_day" | "expired" => VenueOrderStatus::Expired,
        "canceled" => VenueOrderStatus::Canceled,
        "rejected" => VenueOrderStatus::Rejected,
        _ => VenueOrderStatus::New,
    }
}
