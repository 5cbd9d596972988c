//! Application Use Cases
//!
//! Use cases orchestrate domain logic against the ports held by
//! `ExecutionContext`. Every order write goes through the store's optimistic
//! version check; losers reread and retry.

mod admission;
mod apply_fill;
mod cancel_order;
mod ingest_webhook;
mod order_writes;
mod reconciliation;
mod submit_order;

pub use admission::{AdmissionControl, GateStatus};
pub use apply_fill::{ApplyFillUseCase, FillEvent, FillOutcome};
pub use cancel_order::CancelOrderUseCase;
pub use ingest_webhook::{IngestOutcome, WebhookEvent, WebhookEventType, WebhookIngest};
pub use reconciliation::{ReconciliationEngine, ReconciliationError, RunOutcome};
pub use submit_order::{SubmitOrderUseCase, SubmitOutcome};
