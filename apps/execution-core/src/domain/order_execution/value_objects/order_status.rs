//! Order status in the lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order status.
///
/// ```text
/// NEW ─► SUBMITTED_UNCONFIRMED ─► ACCEPTED ─► PARTIALLY_FILLED ─► FILLED
///  │              │                   │               │
///  └──────────────┴───────────────────┴───────────────┴─► CANCELED | REJECTED | FAILED | EXPIRED
/// ```
///
/// The exact edge set lives in `OrderStateMachine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order persisted locally, not yet sent to the venue.
    New,
    /// Submission sent; the venue has not confirmed it yet.
    SubmittedUnconfirmed,
    /// Order accepted by the venue.
    Accepted,
    /// Order partially filled.
    PartiallyFilled,
    /// Order completely filled.
    Filled,
    /// Order canceled.
    Canceled,
    /// Order rejected by the venue.
    Rejected,
    /// Submission presumed lost (never reached the venue).
    Failed,
    /// Order expired at the venue.
    Expired,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 9] = [
        Self::New,
        Self::SubmittedUnconfirmed,
        Self::Accepted,
        Self::PartiallyFilled,
        Self::Filled,
        Self::Canceled,
        Self::Rejected,
        Self::Failed,
        Self::Expired,
    ];

    /// Returns true if the order is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Canceled | Self::Rejected | Self::Failed | Self::Expired
        )
    }

    /// Returns true if the venue has not acknowledged the order yet.
    #[must_use]
    pub const fn is_unconfirmed(&self) -> bool {
        matches!(self, Self::New | Self::SubmittedUnconfirmed)
    }

    /// Returns true if the order can receive fills without a late-fill path.
    #[must_use]
    pub const fn can_fill(&self) -> bool {
        matches!(
            self,
            Self::New | Self::SubmittedUnconfirmed | Self::Accepted | Self::PartiallyFilled
        )
    }

    /// Returns true if the order can be canceled.
    #[must_use]
    pub const fn is_cancelable(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "NEW",
            Self::SubmittedUnconfirmed => "SUBMITTED_UNCONFIRMED",
            Self::Accepted => "ACCEPTED",
            Self::PartiallyFilled => "PARTIALLY_FILLED",
            Self::Filled => "FILLED",
            Self::Canceled => "CANCELED",
            Self::Rejected => "REJECTED",
            Self::Failed => "FAILED",
            Self::Expired => "EXPIRED",
        };
        write!(f, "{s}")
    }
}
