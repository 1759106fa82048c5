use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Side;
use crate::values::Symbol;

/// Position side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    /// Bought the asset, profit when price rises
    Long,
    /// Sold borrowed asset, profit when price falls
    Short,
    /// No exposure
    Flat,
}

impl PositionSide {
    /// Side of the order that would close this position
    pub fn closing_side(&self) -> Option<Side> {
        match self {
            PositionSide::Long => Some(Side::Sell),
            PositionSide::Short => Some(Side::Buy),
            PositionSide::Flat => None,
        }
    }
}

/// Point-in-time position snapshot for a market
///
/// Never cached: it can change between any two gateway calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub side: PositionSide,
    /// Always non-negative; direction lives in `side`
    pub size: Decimal,
    pub entry_price: Decimal,
}

impl Position {
    pub fn new(
        symbol: impl Into<Symbol>,
        side: PositionSide,
        size: Decimal,
        entry_price: Decimal,
    ) -> Self {
        let size = size.abs();
        let side = if size.is_zero() { PositionSide::Flat } else { side };
        Self {
            symbol: symbol.into(),
            side,
            size,
            entry_price,
        }
    }

    /// A flat snapshot (no position held)
    pub fn flat(symbol: impl Into<Symbol>) -> Self {
        Self {
            symbol: symbol.into(),
            side: PositionSide::Flat,
            size: Decimal::ZERO,
            entry_price: Decimal::ZERO,
        }
    }

    /// Build from a signed quantity (positive = long, negative = short)
    pub fn from_signed(symbol: impl Into<Symbol>, quantity: Decimal, entry_price: Decimal) -> Self {
        let side = if quantity > Decimal::ZERO {
            PositionSide::Long
        } else if quantity < Decimal::ZERO {
            PositionSide::Short
        } else {
            PositionSide::Flat
        };
        Self::new(symbol, side, quantity, entry_price)
    }

    pub fn is_flat(&self) -> bool {
        self.side == PositionSide::Flat || self.size.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_signed() {
        let short = Position::from_signed("ETH/USD", dec!(-2.5), dec!(3000));
        assert_eq!(short.side, PositionSide::Short);
        assert_eq!(short.size, dec!(2.5));
        assert_eq!(short.side.closing_side(), Some(Side::Buy));

        let flat = Position::from_signed("ETH/USD", Decimal::ZERO, Decimal::ZERO);
        assert!(flat.is_flat());
        assert_eq!(flat.side.closing_side(), None);
    }

    #[test]
    fn test_zero_size_forces_flat() {
        let pos = Position::new("BTC/USD", PositionSide::Long, Decimal::ZERO, dec!(100));
        assert_eq!(pos.side, PositionSide::Flat);
    }
}
