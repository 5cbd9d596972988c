//! Position drift detection.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::shared::{Quantity, Symbol};

/// A local/venue disagreement on net position quantity.
///
/// Drift is flagged for review and never written back to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionDrift {
    /// Symbol in disagreement.
    pub symbol: Symbol,
    /// Net local quantity, summed over strategies.
    pub local_quantity: Quantity,
    /// Quantity reported by the venue.
    pub venue_quantity: Quantity,
}

impl PositionDrift {
    /// `venue - local`.
    #[must_use]
    pub fn difference(&self) -> Quantity {
        self.venue_quantity - self.local_quantity
    }
}

/// Compare net quantities per symbol. Symbols missing on one side count as
/// zero there.
#[must_use]
pub fn detect_drift(
    local: &BTreeMap<Symbol, Quantity>,
    venue: &BTreeMap<Symbol, Quantity>,
) -> Vec<PositionDrift> {
    let symbols: BTreeSet<&Symbol> = local.keys().chain(venue.keys()).collect();
    symbols
        .into_iter()
        .filter_map(|symbol| {
            let local_quantity = local.get(symbol).copied().unwrap_or_default();
            let venue_quantity = venue.get(symbol).copied().unwrap_or_default();
            (local_quantity != venue_quantity).then(|| PositionDrift {
                symbol: symbol.clone(),
                local_quantity,
                venue_quantity,
            })
        })
        .collect()
}
