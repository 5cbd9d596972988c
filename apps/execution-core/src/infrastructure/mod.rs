//! Infrastructure Layer
//!
//! Adapters for the ports defined in the application layer:
//!
//! - `persistence/`: order, position and ledger storage
//! - `gates/`: kill switch and circuit breaker storage
//! - `venue/`: broker venue clients (REST and simulated)
//! - `clock`: wall and manual clocks

pub mod clock;
pub mod gates;
pub mod persistence;
pub mod venue;

pub use clock::{ManualClock, SystemClock};
pub use gates::InMemoryGateStore;
pub use persistence::InMemoryStore;
pub use venue::{HttpVenueClient, SimulatedVenue};
