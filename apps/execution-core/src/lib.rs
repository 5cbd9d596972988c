// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::items_after_statements,
        clippy::default_trait_access
    )
)]

//! Execution Core - Order Execution Library
//!
//! Accepts order requests, gates them through the kill switch and circuit
//! breaker, submits them to a broker venue, and keeps a local ledger of
//! orders, fills and positions consistent with the venue's view.
//!
//! # Architecture (Clean Architecture + DDD + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: Core business logic
//!   - `order_execution`: Order aggregate, status graph, fills
//!   - `idempotency`: Submission fingerprints and the idempotency window
//!   - `position`: Positions and weighted-average P&L
//!   - `admission`: Kill switch and circuit breaker states
//!   - `reconciliation`: Run summaries, checkpoints, drift
//!
//! - **Application**: Use cases and orchestration
//!   - `ports`: `BrokerVenuePort`, `PersistenceStore`, `GateStore`, `Clock`
//!   - `use_cases`: `AdmissionControl`, `SubmitOrderUseCase`, `ApplyFillUseCase`,
//!     `CancelOrderUseCase`, `WebhookIngest`, `ReconciliationEngine`
//!
//! - **Infrastructure**: Adapters
//!   - `venue`: REST venue client and deterministic simulator
//!   - `persistence`: In-memory store
//!   - `gates`: In-memory gate store
//!   - `clock`: System and manual clocks
//!
//! # Concurrency
//!
//! Submissions, webhooks and reconciliation run concurrently against the
//! same rows. The store is the only arbiter: a unique live fingerprint
//! rejects a racing duplicate create, and versioned writes reject a racing
//! update so the loser rereads.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core business logic with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Cross-cutting Modules
// =============================================================================

/// Configuration loading and defaults.
pub mod config;

/// Error taxonomy shared by every entry point.
pub mod error;

/// Venue error tracking for the circuit breaker.
pub mod resilience;

/// Tracing subscriber setup.
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

// Domain re-exports
pub use domain::order_execution::{Order, OrderRequest, OrderSide, OrderStatus, OrderType};
pub use domain::position::{Position, PositionAccount, PositionKey};
pub use domain::shared::{ClientOrderId, Money, Quantity, Symbol, Timestamp, VenueOrderId};

// Application re-exports
pub use application::ExecutionContext;
pub use application::ports::{BrokerVenuePort, Clock, GateStore, PersistenceStore};
pub use application::use_cases::{
    AdmissionControl, ApplyFillUseCase, CancelOrderUseCase, ReconciliationEngine,
    SubmitOrderUseCase, WebhookIngest,
};

// Infrastructure re-exports
pub use infrastructure::{
    HttpVenueClient, InMemoryGateStore, InMemoryStore, ManualClock, SimulatedVenue, SystemClock,
};

pub use error::{ErrorCode, ExecutionError};
