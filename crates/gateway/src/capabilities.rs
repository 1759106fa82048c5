//! Venue capability registry
//!
//! Declarative per-venue quirks consulted by the order controllers:
//! how a stop order is named, which parameter carries its trigger price,
//! whether reduce-only can be requested, and which operations the venue
//! can perform in place.

use crate::error::CapabilityError;
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tame_ports::OrderParams;

/// How quickly the venue confirms order amendments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationLatency {
    #[default]
    Normal,
    /// Amendments take seconds to show up in open orders
    High,
}

/// Preferred way of reading a position on this venue
///
/// Readers fall back along Direct → AllPositions → Balance when a source
/// reports `NotSupported`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSource {
    /// Single-symbol position query
    #[default]
    Direct,
    /// Fetch every position and filter by symbol
    AllPositions,
    /// Spot venues: base-currency balance read as a long position
    Balance,
}

/// One row of the capability table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueCapabilityProfile {
    /// Order type name the venue expects for a protective stop
    pub stop_order_type_name: String,
    /// Parameter that carries the trigger price
    pub trigger_price_field: String,
    pub reduce_only_supported: bool,
    /// Parameter name for the reduce-only flag, when supported
    #[serde(default)]
    pub reduce_only_field: Option<String>,
    /// Stops can be amended in place; otherwise they are cancelled and recreated
    #[serde(default)]
    pub supports_stop_edit: bool,
    /// Limit orders can be amended in place; otherwise cancel and replace
    #[serde(default = "default_true")]
    pub supports_order_edit: bool,
    #[serde(default)]
    pub confirmation_latency: ConfirmationLatency,
    #[serde(default)]
    pub position_source: PositionSource,
}

fn default_true() -> bool {
    true
}

impl VenueCapabilityProfile {
    /// Profile with the given stop naming and conservative defaults
    pub fn new(
        stop_order_type_name: impl Into<String>,
        trigger_price_field: impl Into<String>,
    ) -> Self {
        Self {
            stop_order_type_name: stop_order_type_name.into(),
            trigger_price_field: trigger_price_field.into(),
            reduce_only_supported: false,
            reduce_only_field: None,
            supports_stop_edit: false,
            supports_order_edit: true,
            confirmation_latency: ConfirmationLatency::Normal,
            position_source: PositionSource::Direct,
        }
    }

    pub fn with_reduce_only(mut self, field: impl Into<String>) -> Self {
        self.reduce_only_supported = true;
        self.reduce_only_field = Some(field.into());
        self
    }

    pub fn with_stop_edit(mut self, supported: bool) -> Self {
        self.supports_stop_edit = supported;
        self
    }

    pub fn with_order_edit(mut self, supported: bool) -> Self {
        self.supports_order_edit = supported;
        self
    }

    pub fn with_latency(mut self, latency: ConfirmationLatency) -> Self {
        self.confirmation_latency = latency;
        self
    }

    pub fn with_position_source(mut self, source: PositionSource) -> Self {
        self.position_source = source;
        self
    }

    /// The reduce-only parameter name, if the venue honours it
    pub fn reduce_only_param(&self) -> Option<&str> {
        if self.reduce_only_supported {
            self.reduce_only_field.as_deref()
        } else {
            None
        }
    }

    /// Parameters for a protective stop at `trigger_price`
    pub fn stop_params(&self, trigger_price: Decimal) -> OrderParams {
        let mut params = OrderParams::new();
        params.insert_decimal(self.trigger_price_field.clone(), trigger_price);
        if let Some(field) = self.reduce_only_param() {
            params.insert(field, true);
        }
        params
    }

    /// Read the trigger price back out of a parameter bag
    pub fn trigger_price_in(&self, params: &OrderParams) -> Option<Decimal> {
        params.get_decimal(&self.trigger_price_field)
    }
}

/// Lookup table of venue profiles keyed by venue id
#[derive(Debug, Clone, Default)]
pub struct VenueCapabilityTable {
    profiles: HashMap<String, VenueCapabilityProfile>,
}

impl VenueCapabilityTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Table pre-populated with the built-in venue rows
    pub fn with_defaults() -> Self {
        let mut table = Self::new();

        table.insert(
            "deribit",
            VenueCapabilityProfile::new("stop_market", "stopLossPrice")
                .with_reduce_only("reduce_only"),
        );
        table.insert(
            "phemex",
            VenueCapabilityProfile::new("stop", "stopPrice"),
        );
        table.insert(
            "binance",
            VenueCapabilityProfile::new("STOP_MARKET", "stopPrice")
                .with_reduce_only("reduceOnly"),
        );
        table.insert(
            "hyperliquid",
            VenueCapabilityProfile::new("market", "stopLossPrice")
                .with_reduce_only("reduceOnly")
                .with_position_source(PositionSource::AllPositions),
        );
        table.insert(
            "kraken",
            VenueCapabilityProfile::new("stop-loss", "stopPrice")
                .with_order_edit(false)
                .with_latency(ConfirmationLatency::High)
                .with_position_source(PositionSource::Balance),
        );
        table.insert(
            "paper",
            VenueCapabilityProfile::new("stop", "stopPrice").with_reduce_only("reduceOnly"),
        );

        table
    }

    /// Register (or replace) a venue row
    pub fn insert(&mut self, venue_id: impl Into<String>, profile: VenueCapabilityProfile) {
        let venue_id = venue_id.into().to_ascii_lowercase();
        debug!("Registering capability profile for {}", venue_id);
        self.profiles.insert(venue_id, profile);
    }

    /// Profile for a venue id (case-insensitive)
    pub fn lookup(&self, venue_id: &str) -> Result<&VenueCapabilityProfile, CapabilityError> {
        self.profiles
            .get(&venue_id.to_ascii_lowercase())
            .ok_or_else(|| CapabilityError::UnknownVenueCapability(venue_id.to_string()))
    }

    pub fn venues(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::Value;

    #[test]
    fn test_lookup_known_venues() {
        let table = VenueCapabilityTable::with_defaults();

        let deribit = table.lookup("deribit").unwrap();
        assert_eq!(deribit.stop_order_type_name, "stop_market");
        assert_eq!(deribit.trigger_price_field, "stopLossPrice");
        assert_eq!(deribit.reduce_only_param(), Some("reduce_only"));

        let phemex = table.lookup("Phemex").unwrap();
        assert_eq!(phemex.stop_order_type_name, "stop");
        assert_eq!(phemex.trigger_price_field, "stopPrice");
        assert!(!phemex.reduce_only_supported);
    }

    #[test]
    fn test_unknown_venue() {
        let table = VenueCapabilityTable::with_defaults();
        assert_eq!(
            table.lookup("mtgox").unwrap_err(),
            CapabilityError::UnknownVenueCapability("mtgox".to_string())
        );
    }

    #[test]
    fn test_stop_params_follow_profile() {
        let table = VenueCapabilityTable::with_defaults();

        let deribit = table.lookup("deribit").unwrap().stop_params(dec!(27500));
        assert_eq!(deribit.get_decimal("stopLossPrice"), Some(dec!(27500)));
        assert_eq!(deribit.get("reduce_only"), Some(&Value::Bool(true)));

        let phemex = table.lookup("phemex").unwrap().stop_params(dec!(28000));
        assert_eq!(phemex.get_decimal("stopPrice"), Some(dec!(28000)));
        assert!(!phemex.contains_key("reduce_only"));
        assert_eq!(phemex.iter().count(), 1);
    }

    #[test]
    fn test_reduce_only_field_ignored_when_unsupported() {
        let mut profile = VenueCapabilityProfile::new("stop", "stopPrice");
        profile.reduce_only_field = Some("reduceOnly".to_string());
        assert_eq!(profile.reduce_only_param(), None);
    }

    #[test]
    fn test_profile_from_json_defaults() {
        let json = r#"{
            "stop_order_type_name": "stop",
            "trigger_price_field": "triggerPrice",
            "reduce_only_supported": false
        }"#;
        let profile: VenueCapabilityProfile = serde_json::from_str(json).unwrap();
        assert!(profile.supports_order_edit);
        assert!(!profile.supports_stop_edit);
        assert_eq!(profile.position_source, PositionSource::Direct);
        assert_eq!(profile.confirmation_latency, ConfirmationLatency::Normal);
    }
}
