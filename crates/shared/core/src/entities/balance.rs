use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Holdings of a single currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub currency: String,
    pub free: Decimal,
    pub used: Decimal,
}

impl Balance {
    pub fn total(&self) -> Decimal {
        self.free + self.used
    }
}
