//! Webhook ingest configuration.

use serde::{Deserialize, Serialize};

/// Shared secret for venue callbacks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Shared secret. Never logged.
    #[serde(default)]
    pub secret: Option<String>,
}

impl WebhookConfig {
    /// Trimmed secret; blank counts as absent.
    #[must_use]
    pub fn effective_secret(&self) -> Option<&str> {
        self.secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
