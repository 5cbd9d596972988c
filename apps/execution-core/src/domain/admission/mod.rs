//! Admission Bounded Context
//!
//! The two trading halts evaluated before any new order is accepted: the
//! operator kill switch and the automatic circuit breaker. Both must be
//! clear for a submission to proceed.

mod circuit_breaker;
mod decision;
mod kill_switch;

pub use circuit_breaker::{CircuitBreakerState, TripReason};
pub use decision::{AdmissionDecision, DenialReason};
pub use kill_switch::KillSwitchState;
