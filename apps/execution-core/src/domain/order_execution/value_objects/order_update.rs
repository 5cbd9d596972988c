//! Partial order updates with explicit-clear semantics.
//!
//! Two kinds of optional field exist in an update:
//!
//! | Field | Omitted | `null` | Value |
//! |-------|---------|--------|-------|
//! | `error_message` | keep | **clear** | set |
//! | venue fields (`venue_order_id`, `filled_*`) | keep | keep | set |
//!
//! An order recovering from a transient error can therefore clear its error
//! message in the same update that carries venue-confirmed fill data, and a
//! caller that does not know the venue id never erases a stored one.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::OrderStatus;
use crate::domain::order_execution::aggregate::Order;
use crate::domain::shared::{Money, Quantity, Timestamp, VenueOrderId};

/// A field change that distinguishes "not supplied" from "explicitly cleared".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldPatch<T> {
    /// Leave the stored value untouched.
    #[default]
    Unchanged,
    /// Clear the stored value.
    Clear,
    /// Replace the stored value.
    Set(T),
}

impl<T> FieldPatch<T> {
    /// Returns true if the patch leaves the field untouched.
    #[must_use]
    pub const fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }

    /// Apply the patch to a stored value.
    pub fn apply_to(self, current: &mut Option<T>) {
        match self {
            Self::Unchanged => {}
            Self::Clear => *current = None,
            Self::Set(value) => *current = Some(value),
        }
    }
}

impl<T: Serialize> Serialize for FieldPatch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unchanged | Self::Clear => serializer.serialize_none(),
            Self::Set(value) => serializer.serialize_some(value),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FieldPatch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Only called when the key is present; a missing key uses `Default`.
        Ok(Option::<T>::deserialize(deserializer)?.map_or(Self::Clear, Self::Set))
    }
}

/// A partial update to a stored order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdate {
    /// New status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    /// Venue order id; `None` preserves the stored value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue_order_id: Option<VenueOrderId>,
    /// Cumulative filled quantity; `None` preserves the stored value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filled_quantity: Option<Quantity>,
    /// Average fill price; `None` preserves the stored value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filled_avg_price: Option<Money>,
    /// Last fill timestamp; `None` preserves the stored value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filled_at: Option<Timestamp>,
    /// Error message; explicit `null` clears it.
    #[serde(default, skip_serializing_if = "FieldPatch::is_unchanged")]
    pub error_message: FieldPatch<String>,
}

impl OrderUpdate {
    /// Update that only changes the status.
    #[must_use]
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Set the venue order id.
    #[must_use]
    pub fn with_venue_order_id(mut self, venue_order_id: VenueOrderId) -> Self {
        self.venue_order_id = Some(venue_order_id);
        self
    }

    /// Set the error message.
    #[must_use]
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = FieldPatch::Set(message.into());
        self
    }

    /// Clear the error message.
    #[must_use]
    pub fn clear_error(mut self) -> Self {
        self.error_message = FieldPatch::Clear;
        self
    }

    /// Returns true if applying this update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Build the update that turns `before` into `after`.
    ///
    /// Venue fields are only emitted when they carry a new value, so the
    /// result never clears venue-confirmed data.
    #[must_use]
    pub fn between(before: &Order, after: &Order) -> Self {
        Self {
            status: (before.status() != after.status()).then_some(after.status()),
            venue_order_id: changed(
                before.venue_order_id().cloned(),
                after.venue_order_id().cloned(),
            ),
            filled_quantity: (before.filled_quantity() != after.filled_quantity())
                .then_some(after.filled_quantity()),
            filled_avg_price: changed(before.filled_avg_price(), after.filled_avg_price()),
            filled_at: changed(before.filled_at(), after.filled_at()),
            error_message: match (before.error_message(), after.error_message()) {
                (a, b) if a == b => FieldPatch::Unchanged,
                (_, None) => FieldPatch::Clear,
                (_, Some(message)) => FieldPatch::Set(message.to_string()),
            },
        }
    }
}

fn changed<T: PartialEq>(before: Option<T>, after: Option<T>) -> Option<T> {
    if before == after { None } else { after }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_null_clears_error_message() {
        let update: OrderUpdate = serde_json::from_str(r#"{"error_message": null}"#).unwrap();
        assert_eq!(update.error_message, FieldPatch::Clear);
    }

    #[test]
    fn omitted_error_message_is_unchanged() {
        let update: OrderUpdate = serde_json::from_str(r#"{"status": "ACCEPTED"}"#).unwrap();
        assert_eq!(update.error_message, FieldPatch::Unchanged);
        assert_eq!(update.status, Some(OrderStatus::Accepted));
    }

    #[test]
    fn null_venue_fields_preserve() {
        let update: OrderUpdate = serde_json::from_str(
            r#"{"venue_order_id": null, "filled_quantity": null, "error_message": "boom"}"#,
        )
        .unwrap();
        assert_eq!(update.venue_order_id, None);
        assert_eq!(update.filled_quantity, None);
        assert_eq!(update.error_message, FieldPatch::Set("boom".to_string()));
    }

    #[test]
    fn field_patch_apply() {
        let mut value = Some("old".to_string());
        FieldPatch::Unchanged.apply_to(&mut value);
        assert_eq!(value.as_deref(), Some("old"));
        FieldPatch::Set("new".to_string()).apply_to(&mut value);
        assert_eq!(value.as_deref(), Some("new"));
        FieldPatch::Clear.apply_to(&mut value);
        assert_eq!(value, None);
    }

    #[test]
    fn serializes_clear_as_null_and_skips_unchanged() {
        let clear = OrderUpdate::default().clear_error();
        assert_eq!(
            serde_json::to_string(&clear).unwrap(),
            r#"{"error_message":null}"#
        );
        assert_eq!(serde_json::to_string(&OrderUpdate::default()).unwrap(), "{}");
        assert!(OrderUpdate::default().is_empty());
    }
}
