//! Deployment environment.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the engine is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Environment {
    /// Local development.
    #[default]
    Development,
    /// Automated tests.
    Test,
    /// Paper trading against a venue sandbox.
    Paper,
    /// Live trading with real money.
    Live,
}

impl Environment {
    /// Returns true for paper and live trading.
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Paper | Self::Live)
    }

    /// Returns true for development and test.
    #[must_use]
    pub const fn is_development(&self) -> bool {
        matches!(self, Self::Development | Self::Test)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "DEVELOPMENT"),
            Self::Test => write!(f, "TEST"),
            Self::Paper => write!(f, "PAPER"),
            Self::Live => write!(f, "LIVE"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DEVELOPMENT" => Ok(Self::Development),
            "TEST" => Ok(Self::Test),
            "PAPER" => Ok(Self::Paper),
            "LIVE" => Ok(Self::Live),
            _ => Err(format!(
                "Invalid environment: {s}. Must be DEVELOPMENT, TEST, PAPER or LIVE."
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_environments() {
        assert!(Environment::Live.is_production());
        assert!(Environment::Paper.is_production());
        assert!(!Environment::Test.is_production());
        assert!(Environment::Development.is_development());
    }

    #[test]
    fn environment_from_str() {
        assert_eq!("live".parse::<Environment>(), Ok(Environment::Live));
        assert_eq!(" test ".parse::<Environment>(), Ok(Environment::Test));
        assert!("staging".parse::<Environment>().is_err());
    }
}
