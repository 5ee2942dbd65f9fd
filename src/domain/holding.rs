//! Holding aggregate: one position per user x symbol x settlement currency.

use crate::domain::{Currency, Decimal, Symbol, TimeMs, UserId};
use serde::{Deserialize, Serialize};

/// Identity of a Holding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HoldingKey {
    pub user_id: UserId,
    pub symbol: Symbol,
    pub currency: Currency,
}

impl HoldingKey {
    pub fn new(user_id: UserId, symbol: Symbol, currency: Currency) -> Self {
        Self {
            user_id,
            symbol,
            currency,
        }
    }
}

impl std::fmt::Display for HoldingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.user_id, self.symbol, self.currency)
    }
}

/// A user's position in one asset, denominated in one settlement currency.
///
/// Invariants maintained by the ledger: quantity >= 0, total_invested >= 0,
/// and no zero-quantity row is ever persisted. average_cost is only
/// meaningful while quantity > 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub key: HoldingKey,
    /// Units of the asset currently held.
    pub quantity: Decimal,
    /// Price paid per unit, in the settlement currency. Recomputed on buys
    /// only; a sell never re-averages the remaining position.
    pub average_cost: Decimal,
    /// Total settlement-currency outlay still attributed to this position.
    /// Reconciles to average_cost * quantity up to rounding drift.
    pub total_invested: Decimal,
    pub updated_at: TimeMs,
}

impl Holding {
    /// A zeroed snapshot for a key whose position was fully sold out.
    pub fn zeroed(key: HoldingKey, at: TimeMs) -> Self {
        Self {
            key,
            quantity: Decimal::zero(),
            average_cost: Decimal::zero(),
            total_invested: Decimal::zero(),
            updated_at: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_snapshot() {
        let key = HoldingKey::new(
            UserId::new("u1"),
            Symbol::new("BTC"),
            Currency::new("AUD"),
        );
        let holding = Holding::zeroed(key.clone(), TimeMs::new(1000));
        assert!(holding.quantity.is_zero());
        assert!(holding.total_invested.is_zero());
        assert_eq!(holding.key, key);
    }

    #[test]
    fn test_key_display() {
        let key = HoldingKey::new(
            UserId::new("u1"),
            Symbol::new("BTC"),
            Currency::new("AUD"),
        );
        assert_eq!(key.to_string(), "u1/BTC/AUD");
    }
}
