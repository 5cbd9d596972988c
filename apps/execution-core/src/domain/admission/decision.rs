//! Admission decision.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{CircuitBreakerState, KillSwitchState, TripReason};

/// Why a submission was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "gate", rename_all = "snake_case")]
pub enum DenialReason {
    /// The operator kill switch is engaged.
    KillSwitchEngaged {
        /// Who engaged it.
        actor: Option<String>,
        /// Operator note.
        note: Option<String>,
    },
    /// The circuit breaker is tripped.
    CircuitBreakerTripped {
        /// Trip reason.
        reason: TripReason,
        /// Trip detail.
        detail: Option<String>,
    },
    /// Gate state could not be read; refused to stay safe.
    GateStateUnavailable {
        /// Underlying failure.
        detail: String,
    },
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KillSwitchEngaged { actor, .. } => match actor {
                Some(actor) => write!(f, "kill switch engaged by {actor}"),
                None => write!(f, "kill switch engaged"),
            },
            Self::CircuitBreakerTripped { reason, .. } => {
                write!(f, "circuit breaker tripped: {reason}")
            }
            Self::GateStateUnavailable { detail } => {
                write!(f, "gate state unavailable: {detail}")
            }
        }
    }
}

/// Result of `may_submit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum AdmissionDecision {
    /// New orders may be submitted.
    Allowed,
    /// New orders are refused.
    Denied(DenialReason),
}

impl AdmissionDecision {
    /// Combine the two gate states. The kill switch is reported first when
    /// both are set.
    #[must_use]
    pub fn evaluate(kill_switch: &KillSwitchState, breaker: &CircuitBreakerState) -> Self {
        if kill_switch.engaged {
            return Self::Denied(DenialReason::KillSwitchEngaged {
                actor: kill_switch.actor.clone(),
                note: kill_switch.note.clone(),
            });
        }
        if breaker.tripped {
            return Self::Denied(DenialReason::CircuitBreakerTripped {
                reason: breaker.reason.unwrap_or(TripReason::Manual),
                detail: breaker.detail.clone(),
            });
        }
        Self::Allowed
    }

    /// Fail-closed denial for an unreadable gate store.
    #[must_use]
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::Denied(DenialReason::GateStateUnavailable {
            detail: detail.into(),
        })
    }

    /// Returns true if submissions are allowed.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}
