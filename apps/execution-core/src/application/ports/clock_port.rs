//! Clock Port
//!
//! Injectable time source so grace periods and windows are testable.

use std::fmt::Debug;

use crate::domain::shared::Timestamp;

/// Source of the current time.
pub trait Clock: Debug + Send + Sync {
    /// Current time.
    fn now(&self) -> Timestamp;
}
