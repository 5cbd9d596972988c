//! Order execution errors.

use std::fmt;

use super::value_objects::OrderStatus;

/// Errors that can occur while creating or transitioning an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// Transition not present in the lifecycle graph.
    InvalidStateTransition {
        /// Current order status.
        from: OrderStatus,
        /// Attempted status.
        to: OrderStatus,
        /// Reason for failure.
        reason: String,
    },

    /// Order cannot be filled in its current state.
    CannotFill {
        /// Current status.
        status: OrderStatus,
    },

    /// Fill quantity exceeds remaining quantity.
    FillExceedsRemaining {
        /// Fill quantity attempted.
        fill_qty: String,
        /// Remaining quantity.
        remaining_qty: String,
    },

    /// Invalid order or fill parameters.
    InvalidParameters {
        /// Field with invalid value.
        field: String,
        /// Error message.
        message: String,
    },
}

impl OrderError {
    /// Shorthand for [`OrderError::InvalidParameters`].
    #[must_use]
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidParameters {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidStateTransition { from, to, reason } => {
                write!(
                    f,
                    "Invalid order state transition: {from} -> {to}: {reason}"
                )
            }
            Self::CannotFill { status } => {
                write!(f, "Cannot fill order in status: {status}")
            }
            Self::FillExceedsRemaining {
                fill_qty,
                remaining_qty,
            } => {
                write!(
                    f,
                    "Fill quantity {fill_qty} exceeds remaining {remaining_qty}"
                )
            }
            Self::InvalidParameters { field, message } => {
                write!(f, "Invalid order parameter '{field}': {message}")
            }
        }
    }
}

impl std::error::Error for OrderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_transition_display() {
        let err = OrderError::InvalidStateTransition {
            from: OrderStatus::Filled,
            to: OrderStatus::Canceled,
            reason: "Order is already filled".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("FILLED"));
        assert!(msg.contains("CANCELED"));
    }

    #[test]
    fn fill_exceeds_remaining_display() {
        let err = OrderError::FillExceedsRemaining {
            fill_qty: "60".to_string(),
            remaining_qty: "40".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("60"));
        assert!(msg.contains("40"));
    }

    #[test]
    fn invalid_parameters_display() {
        let msg = format!("{}", OrderError::invalid("quantity", "must be positive"));
        assert!(msg.contains("'quantity'"));
    }
}
