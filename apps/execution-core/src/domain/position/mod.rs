//! Position Bounded Context
//!
//! Per symbol and strategy position state and the P&L calculator that
//! applies fills to it.

mod account;
mod position;

pub use account::{FillEffect, PositionAccount};
pub use position::{Position, PositionKey};
