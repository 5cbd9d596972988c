//! Position Account
//!
//! Applies a fill to a position and computes realized P&L.
//!
//! A partial reduction (opposite side, smaller than the position) blends the
//! exit price into the average with the same weighted formula used when
//! adding, and realizes nothing until the position closes. Buying 100 @ 100
//! and selling 50 @ 120 therefore leaves 50 @ 320 with zero realized P&L.

use rust_decimal::Decimal;
use rust_decimal::prelude::Signed;
use serde::{Deserialize, Serialize};

use super::Position;
use crate::domain::order_execution::OrderSide;
use crate::domain::shared::{DomainError, Money, Quantity, Timestamp};

/// How a fill changed a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillEffect {
    /// Position was flat and is now open.
    Opened,
    /// Fill added to the existing direction.
    Increased,
    /// Fill reduced the position without closing it.
    Reduced,
    /// Fill closed the position exactly.
    Closed,
    /// Fill closed the position and opened the opposite direction.
    Flipped,
}

impl FillEffect {
    /// Returns true if the fill realized P&L.
    #[must_use]
    pub const fn realizes_pnl(&self) -> bool {
        matches!(self, Self::Closed | Self::Flipped)
    }
}

/// P&L calculator.
pub struct PositionAccount;

impl PositionAccount {
    /// Apply a fill to a position and return the updated position.
    ///
    /// # Errors
    ///
    /// Returns error if quantity or price is not positive.
    pub fn apply_fill(
        position: &Position,
        side: OrderSide,
        quantity: Quantity,
        price: Money,
        now: Timestamp,
    ) -> Result<(Position, FillEffect), DomainError> {
        if !quantity.is_positive() {
            return Err(DomainError::invalid(
                "fill_quantity",
                "Fill quantity must be positive",
            ));
        }
        price.validate_as_price("fill_price")?;

        let held = position.quantity.amount();
        let signed_fill = side.sign() * quantity.amount();
        let new_qty = held + signed_fill;
        let avg = position.avg_entry_price.amount();
        let px = price.amount();

        let mut next = position.clone();
        next.updated_at = now;

        let effect = if held.is_zero() {
            next.avg_entry_price = price;
            FillEffect::Opened
        } else if new_qty.is_zero() {
            next.realized_pnl += Self::closing_pnl(held, avg, px);
            next.avg_entry_price = price;
            FillEffect::Closed
        } else if new_qty.signum() != held.signum() {
            next.realized_pnl += Self::closing_pnl(held, avg, px);
            next.avg_entry_price = price;
            FillEffect::Flipped
        } else {
            let blended = (avg * held.abs() + px * quantity.amount()) / new_qty.abs();
            next.avg_entry_price = Money::new(blended);
            if signed_fill.signum() == held.signum() {
                FillEffect::Increased
            } else {
                FillEffect::Reduced
            }
        };

        next.quantity = Quantity::new(new_qty);
        Ok((next, effect))
    }

    /// P&L from closing `held` (signed) at `exit`.
    fn closing_pnl(held: Decimal, avg: Decimal, exit: Decimal) -> Money {
        // Long: (exit - avg) * qty. Short: (avg - exit) * |qty|. Both reduce
        // to (exit - avg) * signed qty.
        Money::new((exit - avg) * held)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::PositionKey;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn t0() -> Timestamp {
        Timestamp::parse("2026-01-19T14:00:00Z").unwrap()
    }

    fn flat() -> Position {
        Position::flat(PositionKey::new("AAPL", "s1"), t0())
    }

    fn apply(position: &Position, side: OrderSide, qty: i64, price: Decimal) -> Position {
        PositionAccount::apply_fill(position, side, Quantity::from_i64(qty), Money::new(price), t0())
            .unwrap()
            .0
    }

    #[test]
    fn long_round_trip_realizes_profit() {
        let p = apply(&flat(), OrderSide::Buy, 100, dec!(100.00));
        let p = apply(&p, OrderSide::Sell, 100, dec!(120.00));
        assert_eq!(p.realized_pnl(), Money::new(dec!(2000.00)));
        assert!(p.is_flat());
    }

    #[test]
    fn partial_reduction_blends_average_and_defers_realization() {
        let p = apply(&flat(), OrderSide::Buy, 100, dec!(100.00));
        let p = apply(&p, OrderSide::Sell, 50, dec!(120.00));
        assert_eq!(p.realized_pnl(), Money::ZERO);
        assert_eq!(p.quantity(), Quantity::from_i64(50));
        assert_eq!(p.avg_entry_price(), Money::new(dec!(320.00)));

        let p = apply(&p, OrderSide::Sell, 50, dec!(80.00));
        assert_eq!(p.realized_pnl(), Money::new(dec!(-12000.00)));
        assert!(p.is_flat());
    }

    #[test]
    fn short_round_trip_realizes_profit() {
        let p = apply(&flat(), OrderSide::Sell, 100, dec!(100.00));
        let p = apply(&p, OrderSide::Buy, 100, dec!(80.00));
        assert_eq!(p.realized_pnl(), Money::new(dec!(2000.00)));
        assert!(p.is_flat());
    }

    #[test]
    fn adding_uses_weighted_average() {
        let p = apply(&flat(), OrderSide::Buy, 100, dec!(100));
        let (p, effect) = PositionAccount::apply_fill(
            &p,
            OrderSide::Buy,
            Quantity::from_i64(100),
            Money::new(dec!(110)),
            t0(),
        )
        .unwrap();
        assert_eq!(effect, FillEffect::Increased);
        assert_eq!(p.avg_entry_price(), Money::new(dec!(105)));
        assert_eq!(p.realized_pnl(), Money::ZERO);
    }

    #[test]
    fn flip_closes_then_opens_at_fill_price() {
        let p = apply(&flat(), OrderSide::Buy, 100, dec!(100));
        let (p, effect) = PositionAccount::apply_fill(
            &p,
            OrderSide::Sell,
            Quantity::from_i64(150),
            Money::new(dec!(110)),
            t0(),
        )
        .unwrap();
        assert_eq!(effect, FillEffect::Flipped);
        assert_eq!(p.realized_pnl(), Money::new(dec!(1000)));
        assert_eq!(p.quantity(), Quantity::from_i64(-50));
        assert_eq!(p.avg_entry_price(), Money::new(dec!(110)));
    }

    #[test]
    fn closed_position_is_retained_and_reopens() {
        let p = apply(&flat(), OrderSide::Buy, 10, dec!(100));
        let p = apply(&p, OrderSide::Sell, 10, dec!(90));
        let p = apply(&p, OrderSide::Buy, 5, dec!(95));
        assert_eq!(p.realized_pnl(), Money::new(dec!(-100)));
        assert_eq!(p.avg_entry_price(), Money::new(dec!(95)));
    }

    #[test]
    fn rejects_non_positive_fill() {
        assert!(
            PositionAccount::apply_fill(
                &flat(),
                OrderSide::Buy,
                Quantity::ZERO,
                Money::new(dec!(1)),
                t0()
            )
            .is_err()
        );
        assert!(
            PositionAccount::apply_fill(
                &flat(),
                OrderSide::Buy,
                Quantity::from_i64(1),
                Money::ZERO,
                t0()
            )
            .is_err()
        );
    }

    proptest! {
        #[test]
        fn quantity_is_sum_of_signed_fills(
            fills in prop::collection::vec((any::<bool>(), 1i64..500, 1i64..1000), 1..30)
        ) {
            let mut position = flat();
            let mut expected = Decimal::ZERO;
            for (buy, qty, price) in fills {
                let side = if buy { OrderSide::Buy } else { OrderSide::Sell };
                let before = position.realized_pnl();
                let (next, effect) = PositionAccount::apply_fill(
                    &position,
                    side,
                    Quantity::from_i64(qty),
                    Money::new(Decimal::from(price)),
                    t0(),
                ).unwrap();
                expected += side.sign() * Decimal::from(qty);
                prop_assert_eq!(next.quantity().amount(), expected);
                if !effect.realizes_pnl() {
                    prop_assert_eq!(next.realized_pnl(), before);
                }
                position = next;
            }
        }
    }
}
