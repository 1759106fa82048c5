use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{OrderType, Side};
use crate::values::Symbol;

/// Venue-assigned order identifier
pub type OrderId = String;

/// A resting order as observed on the venue
///
/// Owned by the venue; the engine only reads these snapshots and never
/// keeps them beyond a single operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenOrder {
    pub id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    /// Limit price (absent for stop-market orders)
    pub price: Option<Decimal>,
    /// Trigger price for stop orders
    pub trigger_price: Option<Decimal>,
    pub remaining: Decimal,
    /// Untouched venue payload, kept for diagnostics
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl OpenOrder {
    /// Create a resting limit order snapshot
    pub fn limit(
        id: impl Into<OrderId>,
        symbol: impl Into<Symbol>,
        side: Side,
        price: Decimal,
        remaining: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            side,
            order_type: OrderType::Limit,
            price: Some(price),
            trigger_price: None,
            remaining,
            raw: serde_json::Value::Null,
        }
    }

    /// Create a resting stop order snapshot
    pub fn stop(
        id: impl Into<OrderId>,
        symbol: impl Into<Symbol>,
        side: Side,
        trigger_price: Decimal,
        remaining: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            side,
            order_type: OrderType::Stop,
            price: None,
            trigger_price: Some(trigger_price),
            remaining,
            raw: serde_json::Value::Null,
        }
    }

    /// Any trigger-based order counts as a stop, whatever the venue calls it
    pub fn is_stop(&self) -> bool {
        self.order_type == OrderType::Stop || self.trigger_price.is_some()
    }

    /// Plain resting limit order (not a trigger order)
    pub fn is_resting_limit(&self) -> bool {
        self.order_type == OrderType::Limit && !self.is_stop()
    }

    /// The price the order is keyed on: trigger for stops, limit otherwise
    pub fn effective_price(&self) -> Option<Decimal> {
        if self.is_stop() {
            self.trigger_price.or(self.price)
        } else {
            self.price
        }
    }
}

/// Acknowledgement returned by the venue for a placed or edited order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHandle {
    pub id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub trigger_price: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_stop_detection_uses_trigger_price() {
        let mut order = OpenOrder::limit("1", "BTC/USD", Side::Sell, dec!(100), dec!(1));
        assert!(order.is_resting_limit());

        // Some venues report trigger orders as plain limits with a trigger set
        order.trigger_price = Some(dec!(95));
        assert!(order.is_stop());
        assert!(!order.is_resting_limit());
        assert_eq!(order.effective_price(), Some(dec!(95)));
    }
}
