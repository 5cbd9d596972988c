//! Configuration module for the execution core.
//!
//! YAML loading with `${VAR}` / `${VAR:-default}` environment interpolation
//! and validation. Every field has a default, so an empty document is a
//! valid development configuration.
//!
//! # Usage
//!
//! ```rust,ignore
//! use execution_core::config::{Config, load_config};
//!
//! // Load from default path (config.yaml)
//! let config = load_config(None)?;
//!
//! // Load from custom path
//! let config = load_config(Some("custom/config.yaml"))?;
//!
//! println!("poll every {}s", config.reconciliation.poll_interval_seconds);
//! ```

mod admission;
mod environment;
mod observability;
mod reconciliation;
mod submission;
mod venue;
mod webhook;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use admission::AdmissionConfig;
pub use environment::Environment;
pub use observability::{LogFormat, LoggingConfig};
pub use reconciliation::ReconciliationConfig;
pub use submission::SubmissionConfig;
pub use venue::{RetryConfig, VenueConfig, VenueKind};
pub use webhook::WebhookConfig;

/// Default configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "EXECUTION_CORE_CONFIG";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Deployment environment.
    #[serde(default)]
    pub environment: Environment,
    /// Suppress venue calls and relax the webhook secret requirement.
    #[serde(default)]
    pub dry_run: bool,
    /// Reconciliation cadence and bounds.
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    /// Submission timeouts and idempotency window.
    #[serde(default)]
    pub submission: SubmissionConfig,
    /// Admission gate settings.
    #[serde(default)]
    pub admission: AdmissionConfig,
    /// Webhook secret.
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// Venue client.
    #[serde(default)]
    pub venue: VenueConfig,
    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Returns true if the venue client should be the simulator.
    #[must_use]
    pub fn uses_simulated_venue(&self) -> bool {
        self.dry_run || self.venue.kind == VenueKind::Simulated
    }

    /// Returns true if unauthenticated webhooks may be accepted.
    #[must_use]
    pub const fn webhook_secret_optional(&self) -> bool {
        self.environment.is_development() || self.dry_run
    }

    /// How long dedup keys are kept.
    ///
    /// Covers the idempotency window and the initial fill lookback, plus the
    /// window overlap, so any fill a later scan can return is still known.
    #[must_use]
    pub fn dedup_retention(&self) -> chrono::Duration {
        self.submission
            .idempotency_window()
            .max(self.reconciliation.initial_lookback())
            + self.reconciliation.overlap()
    }
}

// ============================================
// Configuration Loading
// ============================================

/// Pick the config path: explicit argument, then `EXECUTION_CORE_CONFIG`,
/// then `config.yaml`.
#[must_use]
pub fn resolve_config_path(explicit: Option<&str>) -> String {
    explicit.map_or_else(
        || {
            std::env::var(CONFIG_PATH_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
        },
        str::to_string,
    )
}

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = resolve_config_path(path);

    let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
        path: path.clone(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = if interpolated.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml_bw::from_str(&interpolated)?
    };
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let var_name = cap.get(1).map_or("", |m| m.as_str());
        let default_value = cap.get(2).map(|m| m.as_str());

        match std::env::var(var_name) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.map_or_else(String::new, str::to_string),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let rec = &config.reconciliation;

    if rec.poll_interval_seconds == 0 {
        return Err(ConfigError::ValidationError(
            "reconciliation.poll_interval_seconds must be positive".to_string(),
        ));
    }

    if rec.timeout_seconds == 0 {
        return Err(ConfigError::ValidationError(
            "reconciliation.timeout_seconds must be positive".to_string(),
        ));
    }

    if rec.fills_backfill_page_size == 0 || rec.fills_backfill_max_pages == 0 {
        return Err(ConfigError::ValidationError(
            "reconciliation.fills_backfill_page_size and fills_backfill_max_pages must be positive"
                .to_string(),
        ));
    }

    if rec.overlap_seconds >= rec.poll_interval_seconds {
        tracing::warn!(
            overlap_seconds = rec.overlap_seconds,
            poll_interval_seconds = rec.poll_interval_seconds,
            "Reconciliation overlap is not shorter than the poll interval"
        );
    }

    if config.submission.venue_timeout_ms == 0 || config.submission.store_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "submission timeouts must be positive".to_string(),
        ));
    }

    // Fail closed: production without a secret would accept forged fills.
    if config.webhook.effective_secret().is_none() && !config.webhook_secret_optional() {
        return Err(ConfigError::ValidationError(format!(
            "webhook.secret is required in {} unless dry_run is set",
            config.environment
        )));
    }

    if config.venue.kind == VenueKind::Http && !config.dry_run {
        if config.venue.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "venue.base_url is required for an HTTP venue".to_string(),
            ));
        }
        if config.venue.api_key.is_empty() || config.venue.api_secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "venue.api_key and venue.api_secret are required for an HTTP venue".to_string(),
            ));
        }
    }

    if config.venue.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "venue.retry.max_attempts must be at least 1".to_string(),
        ));
    }

    Ok(())
}
