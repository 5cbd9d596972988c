//! Resilience patterns for external service calls.
//!
//! Tracks venue failures on the submission path so a run of broker errors
//! trips the trading circuit breaker.

mod broker_errors;

pub use broker_errors::BrokerErrorCounter;
