//! Error taxonomy for the execution core.
//!
//! Every failure surfaced by a use case is an [`ExecutionError`] with a
//! stable machine-readable [`ErrorCode`]. Translating these into transport
//! responses is left to the caller.
//!
//! | Code | Raised when | Retry |
//! |------|-------------|-------|
//! | `VALIDATION_ERROR` | Malformed request, before any mutation | No |
//! | `ADMISSION_DENIED` | Kill switch, breaker, or unreadable gate | No |
//! | `BROKER_TIMEOUT` | Venue outcome unknown | Resubmit the same request |
//! | `BROKER_REJECTED` | Venue refused the order | No |
//! | `BROKER_UNAVAILABLE` | Transport failure or rate limit | Yes |
//! | `RECONCILIATION_DRIFT` | Local and venue positions disagree | Manual review |
//! | `PERSISTENCE_ERROR` | Store failure | Version conflicts only |
//! | `INVALID_TRANSITION` | Edge not in the status graph | No |
//! | `WEBHOOK_UNAUTHORIZED` | Secret missing or wrong | No |
//! | `NOT_FOUND` | Unknown order | No |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::ports::{GateStoreError, PersistenceError, VenueError};
use crate::domain::admission::DenialReason;
use crate::domain::order_execution::OrderError;
use crate::domain::reconciliation::PositionDrift;
use crate::domain::shared::DomainError;

/// Error codes for the execution core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed request.
    ValidationError,
    /// Submission refused by a trading gate.
    AdmissionDenied,
    /// Venue call timed out.
    BrokerTimeout,
    /// Venue rejected the order.
    BrokerRejected,
    /// Venue unreachable or rate limited.
    BrokerUnavailable,
    /// Position drift detected.
    ReconciliationDrift,
    /// Store failure.
    PersistenceError,
    /// Status edge not in the graph.
    InvalidTransition,
    /// Webhook secret check failed.
    WebhookUnauthorized,
    /// Order not found.
    NotFound,
}

impl ErrorCode {
    /// Get the error reason string.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::AdmissionDenied => "ADMISSION_DENIED",
            Self::BrokerTimeout => "BROKER_TIMEOUT",
            Self::BrokerRejected => "BROKER_REJECTED",
            Self::BrokerUnavailable => "BROKER_UNAVAILABLE",
            Self::ReconciliationDrift => "RECONCILIATION_DRIFT",
            Self::PersistenceError => "PERSISTENCE_ERROR",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::WebhookUnauthorized => "WEBHOOK_UNAUTHORIZED",
            Self::NotFound => "NOT_FOUND",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

/// Failure of an execution core operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// Malformed request; nothing was mutated.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A trading gate refused the submission.
    #[error("Admission denied: {0}")]
    AdmissionDenied(DenialReason),

    /// The venue did not answer in time. The order exists locally and a
    /// resubmission of the same request returns it.
    #[error("Broker timeout for order {client_order_id}")]
    BrokerTimeout {
        /// Order whose venue state is unknown.
        client_order_id: String,
    },

    /// The venue rejected the order.
    #[error("Broker rejected order {client_order_id}: {reason}")]
    BrokerRejected {
        /// Rejected order.
        client_order_id: String,
        /// Venue reason.
        reason: String,
    },

    /// The venue was unreachable or refused the call.
    #[error("Broker unavailable: {0}")]
    BrokerUnavailable(String),

    /// Local and venue positions disagree.
    #[error("Reconciliation drift on {} symbol(s)", .0.len())]
    ReconciliationDrift(Vec<PositionDrift>),

    /// Store failure.
    #[error("Persistence error: {0}")]
    Persistence(PersistenceError),

    /// Transition refused by the state machine.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Webhook secret missing or wrong.
    #[error("Webhook unauthorized")]
    WebhookUnauthorized,

    /// Unknown order.
    #[error("Order not found: {0}")]
    NotFound(String),
}

impl ExecutionError {
    /// Get the error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::AdmissionDenied(_) => ErrorCode::AdmissionDenied,
            Self::BrokerTimeout { .. } => ErrorCode::BrokerTimeout,
            Self::BrokerRejected { .. } => ErrorCode::BrokerRejected,
            Self::BrokerUnavailable(_) => ErrorCode::BrokerUnavailable,
            Self::ReconciliationDrift(_) => ErrorCode::ReconciliationDrift,
            Self::Persistence(_) => ErrorCode::PersistenceError,
            Self::InvalidTransition(_) => ErrorCode::InvalidTransition,
            Self::WebhookUnauthorized => ErrorCode::WebhookUnauthorized,
            Self::NotFound(_) => ErrorCode::NotFound,
        }
    }

    /// Returns true if the caller may retry the same request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::BrokerTimeout { .. } | Self::BrokerUnavailable(_) => true,
            Self::Persistence(e) => {
                matches!(e, PersistenceError::VersionConflict { .. } | PersistenceError::Timeout)
            }
            _ => false,
        }
    }
}

impl From<OrderError> for ExecutionError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidParameters { .. } => Self::Validation(err.to_string()),
            _ => Self::InvalidTransition(err.to_string()),
        }
    }
}

impl From<DomainError> for ExecutionError {
    fn from(err: DomainError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<PersistenceError> for ExecutionError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound { id, .. } => Self::NotFound(id),
            other => Self::Persistence(other),
        }
    }
}

impl From<VenueError> for ExecutionError {
    fn from(err: VenueError) -> Self {
        match err {
            VenueError::NotFound { id } => Self::NotFound(id),
            other => Self::BrokerUnavailable(other.to_string()),
        }
    }
}

impl From<GateStoreError> for ExecutionError {
    fn from(err: GateStoreError) -> Self {
        Self::AdmissionDenied(DenialReason::GateStateUnavailable {
            detail: err.to_string(),
        })
    }
}
