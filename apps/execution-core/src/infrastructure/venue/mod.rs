//! Broker Venue Adapters
//!
//! Implementations of `BrokerVenuePort`.

pub mod http;
pub mod simulated;

pub use http::{HttpVenueClient, HttpVenueError};
pub use simulated::{CallCounts, SimulatedVenue, SubmitScript};
