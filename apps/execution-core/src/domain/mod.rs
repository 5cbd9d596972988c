//! Domain Layer
//!
//! Business rules with no infrastructure dependencies: aggregates, value
//! objects and stateless domain services.
//!
//! # Bounded Contexts
//!
//! - [`order_execution`]: Order lifecycle and the status graph
//! - [`idempotency`]: Submission fingerprints and the idempotency window
//! - [`position`]: Positions and the P&L calculator
//! - [`admission`]: Kill switch and circuit breaker gates
//! - [`reconciliation`]: Run summaries, checkpoints and drift

pub mod admission;
pub mod idempotency;
pub mod order_execution;
pub mod position;
pub mod reconciliation;
pub mod shared;
