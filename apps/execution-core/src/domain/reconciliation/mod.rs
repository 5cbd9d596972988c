//! Reconciliation Bounded Context
//!
//! Records produced by comparing the local ledger with the venue: the run
//! summary, the persisted checkpoint, and position drift entries.

mod checkpoint;
mod drift;
mod run;

pub use checkpoint::{FillScanCursor, FillWindow, ReconciliationCheckpoint};
pub use drift::{PositionDrift, detect_drift};
pub use run::{ReconciliationRun, RunMode, RunStatus};
