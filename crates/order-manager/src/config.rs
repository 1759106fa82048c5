//! Engine configuration
//!
//! Loaded from a JSON file; every section has defaults so a partial (or
//! empty) document is valid.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tame_gateway::{ConfirmationLatency, VenueCapabilityProfile};
use thiserror::Error;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Venue id for the capability lookup
    #[serde(default = "default_venue")]
    pub venue: String,

    #[serde(default)]
    pub chase: ChaseConfig,

    #[serde(default)]
    pub bracket: BracketConfig,

    #[serde(default)]
    pub risk: RiskConfig,

    /// Extra capability rows, merged over the built-in table
    #[serde(default)]
    pub venues: HashMap<String, VenueCapabilityProfile>,

    /// Seed markets for the paper venue
    #[serde(default)]
    pub markets: Vec<MarketConfig>,
}

fn default_venue() -> String {
    "paper".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            venue: default_venue(),
            chase: ChaseConfig::default(),
            bracket: BracketConfig::default(),
            risk: RiskConfig::default(),
            venues: HashMap::new(),
            markets: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chase.tick_interval_ms == 0 || self.chase.high_latency_tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "chase tick intervals must be positive".to_string(),
            ));
        }
        if self.bracket.slippage_divisor <= Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "bracket.slippage_divisor must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Chase loop timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChaseConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_interval_ms: u64,
    /// Used on venues whose amendments take long to confirm
    #[serde(default = "default_slow_tick_ms")]
    pub high_latency_tick_interval_ms: u64,
}

fn default_tick_ms() -> u64 {
    1_000
}

fn default_slow_tick_ms() -> u64 {
    5_000
}

impl Default for ChaseConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_ms(),
            high_latency_tick_interval_ms: default_slow_tick_ms(),
        }
    }
}

impl ChaseConfig {
    /// Tick interval for a venue's confirmation latency
    pub fn tick_interval(&self, latency: ConfirmationLatency) -> Duration {
        match latency {
            ConfirmationLatency::Normal => Duration::from_millis(self.tick_interval_ms),
            ConfirmationLatency::High => Duration::from_millis(self.high_latency_tick_interval_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BracketConfig {
    /// Computed entry size is divided by this to leave room for slippage
    #[serde(default = "default_slippage_divisor")]
    pub slippage_divisor: Decimal,
}

fn default_slippage_divisor() -> Decimal {
    dec!(1.05)
}

impl Default for BracketConfig {
    fn default() -> Self {
        Self {
            slippage_divisor: default_slippage_divisor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Threshold applied when a command does not supply one
    #[serde(default = "default_threshold")]
    pub default_risk_return_threshold: Decimal,
}

fn default_threshold() -> Decimal {
    Decimal::ONE
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            default_risk_return_threshold: default_threshold(),
        }
    }
}

/// Paper venue market seed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    pub symbol: String,
    pub price_tick: Decimal,
    pub amount_step: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    #[serde(default)]
    pub last: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config.venue, "paper");
        assert_eq!(
            config.chase.tick_interval(ConfirmationLatency::Normal),
            Duration::from_secs(1)
        );
        assert_eq!(
            config.chase.tick_interval(ConfirmationLatency::High),
            Duration::from_secs(5)
        );
        assert_eq!(config.bracket.slippage_divisor, dec!(1.05));
    }

    #[test]
    fn test_parse_full_document() {
        let json = r#"{
            "venue": "deribit",
            "chase": { "tick_interval_ms": 250 },
            "bracket": { "slippage_divisor": "1.1" },
            "risk": { "default_risk_return_threshold": "2" },
            "venues": {
                "bybit": {
                    "stop_order_type_name": "market",
                    "trigger_price_field": "triggerPrice",
                    "reduce_only_supported": true,
                    "reduce_only_field": "reduceOnly"
                }
            },
            "markets": [
                { "symbol": "BTC/USD", "price_tick": "0.5", "amount_step": "0.001",
                  "bid": "29990", "ask": "30010" }
            ]
        }"#;

        let config = EngineConfig::from_json(json).unwrap();
        assert_eq!(config.venue, "deribit");
        assert_eq!(config.chase.tick_interval_ms, 250);
        assert_eq!(config.chase.high_latency_tick_interval_ms, 5_000);
        assert_eq!(config.bracket.slippage_divisor, dec!(1.1));
        assert_eq!(config.risk.default_risk_return_threshold, dec!(2));
        assert_eq!(config.venues["bybit"].reduce_only_param(), Some("reduceOnly"));
        assert_eq!(config.markets[0].ask, dec!(30010));
    }

    #[test]
    fn test_rejects_zero_divisor() {
        let err = EngineConfig::from_json(r#"{ "bracket": { "slippage_divisor": "0" } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::from_file("/nonexistent/tame.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
