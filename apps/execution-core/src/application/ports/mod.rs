//! Application Ports (Driven)
//!
//! Interfaces for the external systems the core depends on: the broker
//! venue, the persistent store, the gate store and the clock.

mod broker_venue_port;
mod clock_port;
mod gate_store_port;
mod persistence_port;

pub use broker_venue_port::{
    BrokerVenuePort, FillPage, FillQuery, OrderLookup, VenueError, VenueFill, VenueOrder,
    VenueOrderRequest, VenueOrderStatus, VenuePosition,
};
pub use clock_port::Clock;
#[cfg(test)]
pub use gate_store_port::MockGateStore;
pub use gate_store_port::{GateStore, GateStoreError};
pub use persistence_port::{
    FillCommit, FillCommitOutcome, PersistenceError, PersistenceStore, PruneSummary,
};

pub use crate::domain::order_execution::{FieldPatch, OrderUpdate};
