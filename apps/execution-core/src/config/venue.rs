//! Broker venue configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which venue client to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VenueKind {
    /// Deterministic in-process simulator.
    #[default]
    Simulated,
    /// REST venue.
    Http,
}

/// Venue connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Client kind.
    #[serde(default)]
    pub kind: VenueKind,
    /// REST base URL.
    #[serde(default)]
    pub base_url: String,
    /// API key. Never logged.
    #[serde(default)]
    pub api_key: String,
    /// API secret. Never logged.
    #[serde(default)]
    pub api_secret: String,
    /// Per-request HTTP timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retry policy for retryable statuses.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            kind: VenueKind::default(),
            base_url: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            timeout_ms: default_timeout_ms(),
            retry: RetryConfig::default(),
        }
    }
}

impl VenueConfig {
    /// HTTP timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Exponential backoff settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First backoff.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Backoff cap.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Growth factor.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Random spread applied to each delay, as a fraction of it.
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

const fn default_timeout_ms() -> u64 {
    10_000
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    100
}

const fn default_max_backoff_ms() -> u64 {
    5_000
}

const fn default_multiplier() -> f64 {
    2.0
}

const fn default_jitter_factor() -> f64 {
    0.1
}
