//! Execution context.
//!
//! Bundles the store, the venue, the gate store, the clock and the loaded
//! configuration. Every use case receives one; nothing in the core reaches
//! for global state. Each driven-port call goes through a helper that bounds
//! it with the configured timeout.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::application::ports::{
    BrokerVenuePort, Clock, GateStore, GateStoreError, PersistenceError, PersistenceStore,
    VenueError,
};
use crate::config::Config;
use crate::domain::shared::Timestamp;

/// Shared dependencies for all use cases.
#[derive(Clone)]
pub struct ExecutionContext {
    store: Arc<dyn PersistenceStore>,
    venue: Arc<dyn BrokerVenuePort>,
    gates: Arc<dyn GateStore>,
    clock: Arc<dyn Clock>,
    config: Arc<Config>,
}

impl ExecutionContext {
    /// Create a context.
    #[must_use]
    pub fn new(
        store: Arc<dyn PersistenceStore>,
        venue: Arc<dyn BrokerVenuePort>,
        gates: Arc<dyn GateStore>,
        clock: Arc<dyn Clock>,
        config: Config,
    ) -> Self {
        Self {
            store,
            venue,
            gates,
            clock,
            config: Arc::new(config),
        }
    }

    /// Persistent store.
    #[must_use]
    pub fn store(&self) -> &dyn PersistenceStore {
        self.store.as_ref()
    }

    /// Broker venue.
    #[must_use]
    pub fn venue(&self) -> &dyn BrokerVenuePort {
        self.venue.as_ref()
    }

    /// Gate store.
    #[must_use]
    pub fn gates(&self) -> &dyn GateStore {
        self.gates.as_ref()
    }

    /// Loaded configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current time from the injected clock.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Run a store call under `submission.store_timeout_ms`.
    ///
    /// # Errors
    ///
    /// Returns the call's error, or `PersistenceError::Timeout`.
    pub async fn store_call<T, F>(&self, call: F) -> Result<T, PersistenceError>
    where
        F: Future<Output = Result<T, PersistenceError>> + Send,
    {
        tokio::time::timeout(self.config.submission.store_timeout(), call)
            .await
            .unwrap_or(Err(PersistenceError::Timeout))
    }

    /// Run a venue call under `submission.venue_timeout_ms`.
    ///
    /// # Errors
    ///
    /// Returns the call's error, or `VenueError::Timeout`.
    pub async fn venue_call<T, F>(&self, call: F) -> Result<T, VenueError>
    where
        F: Future<Output = Result<T, VenueError>> + Send,
    {
        tokio::time::timeout(self.config.submission.venue_timeout(), call)
            .await
            .unwrap_or(Err(VenueError::Timeout))
    }

    /// Run a gate store call under `admission.gate_timeout_ms`.
    ///
    /// # Errors
    ///
    /// Returns the call's error, or `Unavailable` on timeout.
    pub async fn gate_call<T, F>(&self, call: F) -> Result<T, GateStoreError>
    where
        F: Future<Output = Result<T, GateStoreError>> + Send,
    {
        tokio::time::timeout(self.config.admission.gate_timeout(), call)
            .await
            .unwrap_or_else(|_| {
                Err(GateStoreError::Unavailable {
                    message: "gate store timed out".to_string(),
                })
            })
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("environment", &self.config.environment)
            .field("dry_run", &self.config.dry_run)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
