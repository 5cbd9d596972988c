//! Submission fingerprint.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::domain::order_execution::OrderRequest;

/// Derived key identifying a logically identical submission.
///
/// SHA-256 over `symbol|side|quantity|type|limit`, hex encoded. Decimals are
/// normalized first so `100` and `100.00` fingerprint identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of an order request.
    #[must_use]
    pub fn of(request: &OrderRequest) -> Self {
        let limit = request
            .limit_price
            .map(|p| p.amount().normalize().to_string())
            .unwrap_or_default();
        let canonical = format!(
            "{}|{}|{}|{}|{}",
            request.symbol.as_str(),
            request.side.as_str(),
            request.quantity.amount().normalize(),
            request.order_type.as_str(),
            limit
        );
        Self(hex::encode(Sha256::digest(canonical.as_bytes())))
    }

    /// Wrap an already computed fingerprint (e.g. loaded from storage).
    #[must_use]
    pub fn from_hex(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps log lines readable.
        let short: String = self.0.chars().take(12).collect();
        write!(f, "{short}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order_execution::{OrderRequest, OrderSide};
    use crate::domain::shared::{Money, Quantity};
    use rust_decimal_macros::dec;

    fn request(qty: rust_decimal::Decimal, limit: rust_decimal::Decimal) -> OrderRequest {
        OrderRequest::limit(
            "AAPL",
            OrderSide::Buy,
            Quantity::new(qty),
            Money::new(limit),
            "s1",
        )
    }

    #[test]
    fn identical_requests_share_fingerprint() {
        assert_eq!(
            Fingerprint::of(&request(dec!(100), dec!(150))),
            Fingerprint::of(&request(dec!(100.00), dec!(150.0)))
        );
    }

    #[test]
    fn any_field_change_changes_fingerprint() {
        let base = request(dec!(100), dec!(150));
        let mut other_side = base.clone();
        other_side.side = OrderSide::Sell;
        let mut other_symbol = base.clone();
        other_symbol.symbol = "MSFT".into();

        let fp = Fingerprint::of(&base);
        assert_ne!(fp, Fingerprint::of(&request(dec!(101), dec!(150))));
        assert_ne!(fp, Fingerprint::of(&request(dec!(100), dec!(150.01))));
        assert_ne!(fp, Fingerprint::of(&other_side));
        assert_ne!(fp, Fingerprint::of(&other_symbol));
    }

    #[test]
    fn strategy_is_not_part_of_fingerprint() {
        let a = request(dec!(100), dec!(150));
        let mut b = a.clone();
        b.strategy_id = "other".into();
        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn fingerprint_is_sha256_hex() {
        let fp = Fingerprint::of(&request(dec!(1), dec!(1)));
        assert_eq!(fp.as_str().len(), 64);
        assert_eq!(format!("{fp}").len(), 12);
    }
}
