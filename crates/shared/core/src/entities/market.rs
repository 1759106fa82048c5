use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::values::Symbol;

/// Tradeable market with its precision rules
///
/// Immutable once loaded; refreshed when the venue changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub symbol: Symbol,
    /// Minimum price increment
    pub price_tick: Decimal,
    /// Minimum quantity increment
    pub amount_step: Decimal,
}

impl Market {
    pub fn new(symbol: impl Into<Symbol>, price_tick: Decimal, amount_step: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            price_tick,
            amount_step,
        }
    }

    /// Base currency of the symbol (`BTC` for `BTC/USD:USD`)
    pub fn base(&self) -> &str {
        base_currency(&self.symbol)
    }

    /// Round a price to the nearest tick
    pub fn round_price(&self, price: Decimal) -> Decimal {
        round_to_increment(price, self.price_tick, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Round a quantity down to the amount step, never up
    pub fn round_amount(&self, amount: Decimal) -> Decimal {
        round_to_increment(amount, self.amount_step, RoundingStrategy::ToZero)
    }
}

/// Base currency of a unified symbol
pub fn base_currency(symbol: &str) -> &str {
    symbol.split(['/', '-', ':']).next().unwrap_or(symbol)
}

/// Values too large to express in increments are returned unrounded
fn round_to_increment(value: Decimal, increment: Decimal, strategy: RoundingStrategy) -> Decimal {
    if increment <= Decimal::ZERO {
        return value;
    }
    value
        .checked_div(increment)
        .map(|units| units.round_dp_with_strategy(0, strategy))
        .and_then(|units| units.checked_mul(increment))
        .map(|rounded| rounded.normalize())
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rounding() {
        let market = Market::new("BTC/USD", dec!(0.5), dec!(0.001));
        assert_eq!(market.round_price(dec!(28000.3)), dec!(28000.5));
        assert_eq!(market.round_price(dec!(28000.2)), dec!(28000));
        assert_eq!(market.round_amount(dec!(0.12345)), dec!(0.123));
    }

    #[test]
    fn test_rounding_out_of_range_keeps_value() {
        let market = Market::new("BTC/USD", dec!(0.001), dec!(0.001));
        assert_eq!(market.round_price(Decimal::MAX), Decimal::MAX);
    }

    #[test]
    fn test_base_currency() {
        assert_eq!(base_currency("BTC/USD:USD"), "BTC");
        assert_eq!(base_currency("ETH-PERP"), "ETH");
        assert_eq!(Market::new("SOL/USDT", dec!(0.01), dec!(0.1)).base(), "SOL");
    }
}
