//! REST venue error types.

use thiserror::Error;

use crate::application::ports::VenueError;

/// Errors from the REST venue client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HttpVenueError {
    /// Missing or invalid client settings.
    #[error("Invalid venue configuration: {0}")]
    Config(String),

    /// Request did not complete in time.
    #[error("Request timed out")]
    Timeout,

    /// Network error.
    #[error("Network error: {0}")]
    Network(String),

    /// API returned an error.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code from the API.
        code: String,
        /// Error message from the API.
        message: String,
    },

    /// Order was rejected.
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// Authentication failed.
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Rate limited after exhausting retries.
    #[error("Rate limited")]
    RateLimited,

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    JsonParse(String),

    /// Retries exhausted on a retryable status.
    #[error("Max retries exceeded after {attempts} attempts")]
    MaxRetriesExceeded {
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// Resource not found.
    #[error("Not found: {path}")]
    NotFound {
        /// Request path.
        path: String,
    },
}

impl From<HttpVenueError> for VenueError {
    fn from(err: HttpVenueError) -> Self {
        match err {
            HttpVenueError::Timeout => Self::Timeout,
            HttpVenueError::OrderRejected(reason) => Self::Rejected { reason },
            HttpVenueError::RateLimited => Self::RateLimited,
            HttpVenueError::NotFound { path } => Self::NotFound { id: path },
            other => Self::Unavailable {
                message: other.to_string(),
            },
        }
    }
}
