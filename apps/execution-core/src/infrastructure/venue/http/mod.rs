//! REST venue adapter.

mod api_types;
mod client;
mod error;
mod retry;

pub use client::HttpVenueClient;
pub use error::HttpVenueError;
pub use retry::ExponentialBackoff;
