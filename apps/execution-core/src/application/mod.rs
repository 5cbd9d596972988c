//! Application Layer
//!
//! The application layer orchestrates domain logic through use cases.
//! It defines:
//!
//! - **Ports**: Interfaces for the venue, the store, the gate store and the clock
//! - **Context**: The shared handle on those ports, with per-call timeouts
//! - **Use Cases**: Admission, submission, fills, cancels, webhooks, reconciliation

pub mod context;
pub mod ports;
pub mod use_cases;

pub use context::ExecutionContext;
pub use ports::*;
pub use use_cases::*;
