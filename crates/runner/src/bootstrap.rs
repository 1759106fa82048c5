//! Bootstrap - venue and engine setup
//!
//! Builds the paper venue described by the config:
//! - Resolves the venue's capability row (built-in table plus config rows)
//! - Lists the seed markets with their top of book and last price

use crate::error::Result;
use log::{info, warn};
use rust_decimal::Decimal;
use std::sync::Arc;
use tame_core::Market;
use tame_gateway::{PaperGateway, VenueCapabilityTable};
use tame_order_manager::{EngineConfig, MarketConfig, OrderEngine};

/// Capability table with the config's venue rows layered on top
pub fn capability_table(config: &EngineConfig) -> VenueCapabilityTable {
    let mut table = VenueCapabilityTable::with_defaults();
    for (venue, profile) in &config.venues {
        table.insert(venue.clone(), profile.clone());
    }
    table
}

/// Paper venue emulating `config.venue`, seeded with `config.markets`
pub fn paper_gateway(config: &EngineConfig) -> Result<Arc<PaperGateway>> {
    let table = capability_table(config);
    let gateway = PaperGateway::emulating(&table, &config.venue)?;

    if config.markets.is_empty() {
        warn!("No markets configured; the paper venue is empty");
    }
    for seed in &config.markets {
        gateway.add_market(Market::new(
            seed.symbol.clone(),
            seed.price_tick,
            seed.amount_step,
        ));
        gateway.set_book(&seed.symbol, seed.bid, seed.ask);
        let last = seed
            .last
            .unwrap_or_else(|| (seed.bid + seed.ask) / Decimal::TWO);
        gateway.set_last(&seed.symbol, last);
    }

    info!(
        "Paper venue emulating {} with {} markets",
        config.venue,
        config.markets.len()
    );
    Ok(Arc::new(gateway))
}

/// Paper session used when no config file is given
pub fn demo_config() -> EngineConfig {
    EngineConfig {
        markets: vec![MarketConfig {
            symbol: "BTC/USD".to_string(),
            price_tick: Decimal::new(5, 1),
            amount_step: Decimal::new(1, 3),
            bid: Decimal::from(29_990),
            ask: Decimal::from(30_010),
            last: None,
        }],
        ..Default::default()
    }
}

/// Engine over a freshly seeded paper venue
pub fn paper_engine(config: EngineConfig) -> Result<(Arc<PaperGateway>, OrderEngine)> {
    let gateway = paper_gateway(&config)?;
    let engine = OrderEngine::new(gateway.clone(), config)?;
    Ok((gateway, engine))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunnerError;
    use rust_decimal_macros::dec;
    use tame_gateway::VenueGateway;

    #[tokio::test]
    async fn test_seeds_markets_with_mid_as_last() {
        let config = EngineConfig {
            venue: "deribit".to_string(),
            markets: vec![MarketConfig {
                symbol: "BTC/USD".to_string(),
                price_tick: dec!(0.5),
                amount_step: dec!(0.001),
                bid: dec!(29990),
                ask: dec!(30010),
                last: None,
            }],
            ..Default::default()
        };

        let gateway = paper_gateway(&config).unwrap();
        assert_eq!(gateway.profile().stop_order_type_name, "stop_market");
        let ticker = gateway.fetch_ticker("BTC/USD").await.unwrap();
        assert_eq!(ticker.last, dec!(30000));
    }

    #[test]
    fn test_demo_config_is_valid() {
        let config = demo_config();
        config.validate().unwrap();
        assert_eq!(config.markets[0].price_tick, dec!(0.5));
    }

    #[test]
    fn test_unknown_venue() {
        let config = EngineConfig {
            venue: "nowhere".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            paper_gateway(&config),
            Err(RunnerError::Capability(_))
        ));
    }
}
