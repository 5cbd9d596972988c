//! In-memory gate store.
//!
//! Holds the kill switch and circuit breaker in process. The outage toggle
//! lets tests exercise fail-closed admission.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::application::ports::{GateStore, GateStoreError};
use crate::domain::admission::{CircuitBreakerState, KillSwitchState};

#[derive(Debug, Default)]
struct Gates {
    kill_switch: KillSwitchState,
    circuit_breaker: CircuitBreakerState,
}

/// In-memory implementation of `GateStore`.
#[derive(Debug, Default)]
pub struct InMemoryGateStore {
    gates: RwLock<Gates>,
    unavailable: AtomicBool,
}

impl InMemoryGateStore {
    /// Create a store with both gates open.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the store being unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), GateStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GateStoreError::Unavailable {
                message: "gate store offline".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl GateStore for InMemoryGateStore {
    async fn kill_switch(&self) -> Result<KillSwitchState, GateStoreError> {
        self.check_available()?;
        let gates = self.gates.read().unwrap_or_else(PoisonError::into_inner);
        Ok(gates.kill_switch.clone())
    }

    async fn circuit_breaker(&self) -> Result<CircuitBreakerState, GateStoreError> {
        self.check_available()?;
        let gates = self.gates.read().unwrap_or_else(PoisonError::into_inner);
        Ok(gates.circuit_breaker.clone())
    }

    async fn set_kill_switch(&self, state: KillSwitchState) -> Result<(), GateStoreError> {
        self.check_available()?;
        self.gates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .kill_switch = state;
        Ok(())
    }

    async fn set_circuit_breaker(&self, state: CircuitBreakerState) -> Result<(), GateStoreError> {
        self.check_available()?;
        self.gates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .circuit_breaker = state;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::Timestamp;

    #[tokio::test]
    async fn gates_start_open() {
        let store = InMemoryGateStore::new();
        assert!(!store.kill_switch().await.unwrap().engaged);
        assert!(!store.circuit_breaker().await.unwrap().tripped);
    }

    #[tokio::test]
    async fn writes_are_visible() {
        let store = InMemoryGateStore::new();
        let now = Timestamp::parse("2026-01-19T14:00:00Z").unwrap();
        store
            .set_kill_switch(KillSwitchState::engaged("ops", None, now))
            .await
            .unwrap();
        let state = store.kill_switch().await.unwrap();
        assert!(state.engaged);
        assert_eq!(state.actor.as_deref(), Some("ops"));
    }

    #[tokio::test]
    async fn outage_surfaces_as_unavailable() {
        let store = InMemoryGateStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.kill_switch().await,
            Err(GateStoreError::Unavailable { .. })
        ));
    }
}
