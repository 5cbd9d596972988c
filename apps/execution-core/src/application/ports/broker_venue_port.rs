//! Broker Venue Port (Driven Port)
//!
//! Capability set the core needs from a broker venue: submit, cancel, order
//! lookup, fill history and positions. The REST client and the
//! deterministic simulator both implement it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::order_execution::{Fill, Order, OrderSide, OrderStatus, OrderType};
use crate::domain::shared::{
    ClientOrderId, FillId, Money, Quantity, Symbol, Timestamp, VenueOrderId,
};

/// Request to place an order at the venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueOrderRequest {
    /// Client order id, echoed back by the venue.
    pub client_order_id: ClientOrderId,
    /// Symbol to trade.
    pub symbol: Symbol,
    /// Order side.
    pub side: OrderSide,
    /// Quantity.
    pub quantity: Quantity,
    /// Order type.
    pub order_type: OrderType,
    /// Limit price (limit orders only).
    pub limit_price: Option<Money>,
}

impl VenueOrderRequest {
    /// Build the venue request for a local order.
    #[must_use]
    pub fn from_order(order: &Order) -> Self {
        Self {
            client_order_id: order.client_order_id().clone(),
            symbol: order.symbol().clone(),
            side: order.side(),
            quantity: order.quantity(),
            order_type: order.order_type(),
            limit_price: order.limit_price(),
        }
    }
}

/// Order status as reported by the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueOrderStatus {
    /// Received, not yet working.
    New,
    /// Working at the venue.
    Accepted,
    /// Some quantity executed.
    PartiallyFilled,
    /// Fully executed.
    Filled,
    /// Canceled.
    Canceled,
    /// Refused by the venue.
    Rejected,
    /// Expired (e.g. day order at close).
    Expired,
}

impl VenueOrderStatus {
    /// Local terminal status this venue status implies without fills, if any.
    #[must_use]
    pub const fn terminal_status(&self) -> Option<OrderStatus> {
        match self {
            Self::Canceled => Some(OrderStatus::Canceled),
            Self::Rejected => Some(OrderStatus::Rejected),
            Self::Expired => Some(OrderStatus::Expired),
            Self::New | Self::Accepted | Self::PartiallyFilled | Self::Filled => None,
        }
    }

    /// Returns true once the venue will not change the order further.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Canceled | Self::Rejected | Self::Expired
        )
    }
}

/// Venue view of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueOrder {
    /// Venue-assigned id.
    pub venue_order_id: VenueOrderId,
    /// Client order id.
    pub client_order_id: ClientOrderId,
    /// Venue status.
    pub status: VenueOrderStatus,
    /// Cumulative executed quantity.
    pub filled_quantity: Quantity,
    /// Average execution price.
    pub filled_avg_price: Option<Money>,
    /// Rejection reason, when rejected.
    pub reject_reason: Option<String>,
    /// Last venue update.
    pub updated_at: Timestamp,
}

/// An execution reported by the venue's fill history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueFill {
    /// Venue execution id.
    pub fill_id: FillId,
    /// Order the fill belongs to.
    pub venue_order_id: VenueOrderId,
    /// Client order id, when the venue reports it.
    pub client_order_id: Option<ClientOrderId>,
    /// Symbol.
    pub symbol: Symbol,
    /// Side.
    pub side: OrderSide,
    /// Executed quantity.
    pub quantity: Quantity,
    /// Execution price.
    pub price: Money,
    /// Execution time.
    pub executed_at: Timestamp,
}

impl VenueFill {
    /// Dedup key shared with webhook fill events.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        format!("fill:{}", self.fill_id)
    }

    /// Convert to the domain fill.
    #[must_use]
    pub fn to_fill(&self) -> Fill {
        Fill::new(
            Some(self.fill_id.clone()),
            self.quantity,
            self.price,
            self.executed_at,
        )
    }
}

/// Fill history query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillQuery {
    /// Inclusive lower bound on execution time.
    pub since: Timestamp,
    /// Inclusive upper bound on execution time.
    pub until: Timestamp,
    /// Restrict to one order.
    pub venue_order_id: Option<VenueOrderId>,
    /// Opaque continuation token from the previous page.
    pub page_token: Option<String>,
    /// Maximum fills per page.
    pub page_size: u32,
}

impl FillQuery {
    /// Query over a time range.
    #[must_use]
    pub const fn between(since: Timestamp, until: Timestamp, page_size: u32) -> Self {
        Self {
            since,
            until,
            venue_order_id: None,
            page_token: None,
            page_size,
        }
    }

    /// Restrict the query to one order.
    #[must_use]
    pub fn for_order(mut self, venue_order_id: VenueOrderId) -> Self {
        self.venue_order_id = Some(venue_order_id);
        self
    }

    /// Continue from a page token.
    #[must_use]
    pub fn with_page_token(mut self, token: Option<String>) -> Self {
        self.page_token = token;
        self
    }
}

/// One page of fills, ordered by execution time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillPage {
    /// Fills on this page.
    pub fills: Vec<VenueFill>,
    /// Token for the next page, `None` on the last page.
    pub next_page_token: Option<String>,
}

/// Net position reported by the venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenuePosition {
    /// Symbol.
    pub symbol: Symbol,
    /// Signed quantity.
    pub quantity: Quantity,
}

/// How to look an order up at the venue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderLookup {
    /// By venue order id.
    Venue(VenueOrderId),
    /// By client order id (venue id unknown, e.g. after a timeout).
    Client(ClientOrderId),
}

impl OrderLookup {
    /// Prefer the venue id when the order has one.
    #[must_use]
    pub fn for_order(order: &Order) -> Self {
        order.venue_order_id().map_or_else(
            || Self::Client(order.client_order_id().clone()),
            |id| Self::Venue(id.clone()),
        )
    }
}

/// Venue port error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VenueError {
    /// The call did not complete in time; the outcome is unknown.
    #[error("Venue call timed out")]
    Timeout,

    /// Order rejected by the venue.
    #[error("Order rejected: {reason}")]
    Rejected {
        /// Rejection reason.
        reason: String,
    },

    /// Order not found.
    #[error("Order not found at venue: {id}")]
    NotFound {
        /// The missing id.
        id: String,
    },

    /// Transport or server failure.
    #[error("Venue unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// Refused before acceptance because of rate limits.
    #[error("Rate limited by venue")]
    RateLimited,
}

impl VenueError {
    /// Returns true if the call may be retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Unavailable { .. } | Self::RateLimited)
    }

    /// Returns true if the venue may have acted on the request anyway.
    #[must_use]
    pub const fn is_outcome_unknown(&self) -> bool {
        matches!(self, Self::Timeout | Self::Unavailable { .. })
    }
}

/// Port for broker venue interactions.
#[async_trait]
pub trait BrokerVenuePort: Send + Sync {
    /// Submit an order.
    async fn submit(&self, request: VenueOrderRequest) -> Result<VenueOrder, VenueError>;

    /// Cancel an order.
    async fn cancel(&self, venue_order_id: &VenueOrderId) -> Result<(), VenueError>;

    /// Look up one order.
    async fn get_order(&self, lookup: &OrderLookup) -> Result<VenueOrder, VenueError>;

    /// Page through fill history.
    async fn get_fills(&self, query: &FillQuery) -> Result<FillPage, VenueError>;

    /// Net positions per symbol.
    async fn get_positions(&self) -> Result<Vec<VenuePosition>, VenueError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order_execution::{OrderRequest, OrderStateMachine};

    #[test]
    fn lookup_prefers_venue_id() {
        let request = OrderRequest::market("AAPL", OrderSide::Buy, Quantity::from_i64(1), "s1");
        let now = Timestamp::parse("2026-01-19T14:00:00Z").unwrap();
        let order = OrderStateMachine::create(request, "ord-1".into(), now).unwrap();
        assert_eq!(
            OrderLookup::for_order(&order),
            OrderLookup::Client("ord-1".into())
        );

        let submitted =
            OrderStateMachine::mark_submitted(&order, Some("v-1".into()), now).unwrap();
        assert_eq!(
            OrderLookup::for_order(&submitted),
            OrderLookup::Venue("v-1".into())
        );
    }

    #[test]
    fn venue_error_classification() {
        assert!(VenueError::Timeout.is_outcome_unknown());
        assert!(VenueError::RateLimited.is_retryable());
        assert!(!VenueError::RateLimited.is_outcome_unknown());
        assert!(
            !VenueError::Rejected {
                reason: "x".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn venue_terminal_mapping() {
        assert_eq!(
            VenueOrderStatus::Expired.terminal_status(),
            Some(OrderStatus::Expired)
        );
        assert_eq!(VenueOrderStatus::Filled.terminal_status(), None);
        assert!(VenueOrderStatus::Filled.is_final());
    }
}
