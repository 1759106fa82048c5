use serde::{Deserialize, Serialize};

/// Normalized order types as reported by the venue gateway
///
/// Venues name their stop orders differently (`stop`, `stop_market`, ...);
/// the gateway folds all trigger-based orders into `Stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Execute at current market price
    Market,
    /// Execute at specified price or better
    Limit,
    /// Activates when price crosses the trigger price
    Stop,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
            OrderType::Stop => "stop",
        }
    }
}
