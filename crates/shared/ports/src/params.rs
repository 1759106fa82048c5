use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Open key/value bag of venue-specific order parameters
///
/// Keys are venue field names (`stopPrice`, `reduce_only`, ...) taken from
/// the venue capability profile, never hard-coded by the controllers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderParams(BTreeMap<String, Value>);

impl OrderParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Store a decimal as a JSON string to keep full precision
    pub fn insert_decimal(&mut self, key: impl Into<String>, value: Decimal) {
        self.0.insert(key.into(), Value::String(value.to_string()));
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Read back a decimal written by `insert_decimal` (or a JSON number)
    pub fn get_decimal(&self, key: &str) -> Option<Decimal> {
        match self.0.get(key)? {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.to_string().parse().ok(),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decimal_round_trip_keeps_precision() {
        let mut params = OrderParams::new();
        params.insert_decimal("stopPrice", dec!(28000.125));
        params.insert("reduce_only", true);

        assert_eq!(params.get_decimal("stopPrice"), Some(dec!(28000.125)));
        assert_eq!(params.get("reduce_only"), Some(&Value::Bool(true)));
        assert_eq!(params.get_decimal("reduce_only"), None);
    }
}
