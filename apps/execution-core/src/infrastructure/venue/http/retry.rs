//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Backoff calculator for one request.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    attempt: u32,
    max_attempts: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
    multiplier: f64,
    jitter_factor: f64,
}

impl ExponentialBackoff {
    /// Start a fresh backoff sequence.
    #[must_use]
    pub const fn new(config: &RetryConfig) -> Self {
        Self {
            attempt: 0,
            max_attempts: config.max_attempts,
            initial_backoff_ms: config.initial_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
            multiplier: config.multiplier,
            jitter_factor: config.jitter_factor,
        }
    }

    /// Attempts made so far.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Record a failed attempt and return the delay before the next one,
    /// or `None` once `max_attempts` is reached.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            return None;
        }
        let base = self.base_backoff_ms();
        Some(Duration::from_millis(self.apply_jitter(base).min(self.max_backoff_ms)))
    }

    fn base_backoff_ms(&self) -> u64 {
        #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
        let exponent = (self.attempt - 1) as i32;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let backoff = (self.initial_backoff_ms as f64 * self.multiplier.powi(exponent)) as u64;
        backoff.min(self.max_backoff_ms)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn apply_jitter(&self, backoff_ms: u64) -> u64 {
        if self.jitter_factor <= 0.0 || backoff_ms == 0 {
            return backoff_ms;
        }
        let spread = backoff_ms as f64 * self.jitter_factor;
        let min = (backoff_ms as f64 - spread).max(0.0);
        let max = backoff_ms as f64 + spread;
        rand::rng().random_range(min..=max) as u64
    }
}
