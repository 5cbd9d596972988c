//! Position record.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::{Money, Quantity, StrategyId, Symbol, Timestamp};

/// Identity of a position: one per symbol and strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionKey {
    /// Instrument symbol.
    pub symbol: Symbol,
    /// Owning strategy.
    pub strategy_id: StrategyId,
}

impl PositionKey {
    /// Create a new position key.
    #[must_use]
    pub fn new(symbol: impl Into<Symbol>, strategy_id: impl Into<StrategyId>) -> Self {
        Self {
            symbol: symbol.into(),
            strategy_id: strategy_id.into(),
        }
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.symbol, self.strategy_id)
    }
}

/// A position held by one strategy in one symbol.
///
/// Quantity is signed: positive is long, negative is short. A position that
/// returns to zero is kept as a closed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub(crate) key: PositionKey,
    pub(crate) quantity: Quantity,
    pub(crate) avg_entry_price: Money,
    pub(crate) realized_pnl: Money,
    pub(crate) created_at: Timestamp,
    pub(crate) updated_at: Timestamp,
    pub(crate) version: u64,
}

impl Position {
    /// Create a flat position, used when the first fill for a key arrives.
    #[must_use]
    pub const fn flat(key: PositionKey, now: Timestamp) -> Self {
        Self {
            key,
            quantity: Quantity::ZERO,
            avg_entry_price: Money::ZERO,
            realized_pnl: Money::ZERO,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Get the position key.
    #[must_use]
    pub const fn key(&self) -> &PositionKey {
        &self.key
    }

    /// Get the symbol.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.key.symbol
    }

    /// Get the owning strategy.
    #[must_use]
    pub const fn strategy_id(&self) -> &StrategyId {
        &self.key.strategy_id
    }

    /// Get the signed quantity.
    #[must_use]
    pub const fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// Get the average entry price. Only meaningful while the quantity is
    /// non-zero.
    #[must_use]
    pub const fn avg_entry_price(&self) -> Money {
        self.avg_entry_price
    }

    /// Get the cumulative realized P&L.
    #[must_use]
    pub const fn realized_pnl(&self) -> Money {
        self.realized_pnl
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Get the last update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Get the optimistic concurrency version.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Returns true if the position holds no quantity.
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Unrealized P&L at a mark price: `(mark - avg) * signed_qty`.
    #[must_use]
    pub fn unrealized_pnl(&self, mark: Money) -> Money {
        if self.is_flat() {
            return Money::ZERO;
        }
        (mark - self.avg_entry_price) * self.quantity.amount()
    }

    /// Advance the version after a successful write.
    pub fn bump_version(&mut self) {
        self.version += 1;
    }
}
