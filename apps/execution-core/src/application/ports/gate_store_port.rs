//! Gate Store Port (Driven Port)
//!
//! Fast shared store holding the kill switch and circuit breaker flags.

use async_trait::async_trait;

use crate::domain::admission::{CircuitBreakerState, KillSwitchState};

/// Gate store error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateStoreError {
    /// Store unreachable.
    #[error("Gate store unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// Stored value could not be decoded.
    #[error("Gate state corrupt: {message}")]
    Corrupt {
        /// Error details.
        message: String,
    },
}

/// Port for reading and writing the trading gates.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GateStore: Send + Sync {
    /// Read the kill switch.
    async fn kill_switch(&self) -> Result<KillSwitchState, GateStoreError>;

    /// Read the circuit breaker.
    async fn circuit_breaker(&self) -> Result<CircuitBreakerState, GateStoreError>;

    /// Write the kill switch.
    async fn set_kill_switch(&self, state: KillSwitchState) -> Result<(), GateStoreError>;

    /// Write the circuit breaker.
    async fn set_circuit_breaker(&self, state: CircuitBreakerState) -> Result<(), GateStoreError>;
}
