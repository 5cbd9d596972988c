//! Kill switch state.

use serde::{Deserialize, Serialize};

use crate::domain::shared::Timestamp;

/// Operator-controlled, all-or-nothing halt on new submissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillSwitchState {
    /// Whether the kill switch is engaged.
    pub engaged: bool,
    /// Operator who last changed the switch.
    pub actor: Option<String>,
    /// Free-text note supplied when engaging.
    pub note: Option<String>,
    /// When the switch last changed.
    pub changed_at: Option<Timestamp>,
}

impl KillSwitchState {
    /// Engaged state.
    #[must_use]
    pub fn engaged(actor: impl Into<String>, note: Option<String>, now: Timestamp) -> Self {
        Self {
            engaged: true,
            actor: Some(actor.into()),
            note,
            changed_at: Some(now),
        }
    }

    /// Released state.
    #[must_use]
    pub fn released(actor: impl Into<String>, now: Timestamp) -> Self {
        Self {
            engaged: false,
            actor: Some(actor.into()),
            note: None,
            changed_at: Some(now),
        }
    }
}
