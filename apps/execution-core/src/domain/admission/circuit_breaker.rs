//! Circuit breaker state and trip reasons.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::Timestamp;

/// Why the circuit breaker tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TripReason {
    /// Daily loss limit exceeded.
    DailyLossExceeded,
    /// Maximum drawdown exceeded.
    MaxDrawdown,
    /// Market data went stale.
    StaleData,
    /// Too many consecutive broker failures.
    BrokerErrors,
    /// Tripped by an operator.
    Manual,
}

impl TripReason {
    /// Wire code surfaced to operators.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DailyLossExceeded => "daily-loss-exceeded",
            Self::MaxDrawdown => "max-drawdown",
            Self::StaleData => "stale-data",
            Self::BrokerErrors => "broker-errors",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for TripReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Automatic trading halt with a recorded reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    /// Whether the breaker is tripped.
    pub tripped: bool,
    /// Reason for the current trip.
    pub reason: Option<TripReason>,
    /// Extra context for the trip (e.g. the loss figure).
    pub detail: Option<String>,
    /// Who reset or manually tripped the breaker.
    pub actor: Option<String>,
    /// When the breaker last changed.
    pub changed_at: Option<Timestamp>,
}

impl CircuitBreakerState {
    /// Tripped state.
    #[must_use]
    pub const fn tripped(reason: TripReason, detail: Option<String>, now: Timestamp) -> Self {
        Self {
            tripped: true,
            reason: Some(reason),
            detail,
            actor: None,
            changed_at: Some(now),
        }
    }

    /// Reset state.
    #[must_use]
    pub fn reset(actor: impl Into<String>, now: Timestamp) -> Self {
        Self {
            tripped: false,
            reason: None,
            detail: None,
            actor: Some(actor.into()),
            changed_at: Some(now),
        }
    }
}
