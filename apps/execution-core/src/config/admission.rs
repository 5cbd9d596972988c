//! Admission control configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Gate read budget and the broker-error trip threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Budget for reading both gates. Slower reads deny.
    #[serde(default = "default_gate_timeout")]
    pub gate_timeout_ms: u64,
    /// Consecutive venue failures that trip the breaker. 0 disables.
    #[serde(default = "default_broker_error_threshold")]
    pub broker_error_threshold: u32,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            gate_timeout_ms: default_gate_timeout(),
            broker_error_threshold: default_broker_error_threshold(),
        }
    }
}

impl AdmissionConfig {
    /// Gate read timeout.
    #[must_use]
    pub const fn gate_timeout(&self) -> Duration {
        Duration::from_millis(self.gate_timeout_ms)
    }
}

const fn default_gate_timeout() -> u64 {
    500
}

const fn default_broker_error_threshold() -> u32 {
    5
}
