//! Position Reader
//!
//! Resolves the live position for a market. Venues differ in how positions
//! can be queried, so the reader starts from the source named in the
//! capability profile and falls back along
//! Direct → AllPositions → Balance whenever a source is unsupported.
//!
//! Snapshots are never cached: positions can change between any two calls.

use crate::error::Result;
use log::debug;
use rust_decimal::Decimal;
use std::sync::Arc;
use tame_core::{Position, base_currency};
use tame_gateway::PositionSource;
use tame_ports::{GatewayError, VenueGateway};

const FALLBACK_CHAIN: [PositionSource; 3] = [
    PositionSource::Direct,
    PositionSource::AllPositions,
    PositionSource::Balance,
];

/// Reads positions with venue-specific fallbacks
#[derive(Clone)]
pub struct PositionReader {
    gateway: Arc<dyn VenueGateway>,
    source: PositionSource,
}

impl PositionReader {
    pub fn new(gateway: Arc<dyn VenueGateway>, source: PositionSource) -> Self {
        Self { gateway, source }
    }

    /// Current position for `symbol`; a missing position reads as flat
    pub async fn read(&self, symbol: &str) -> Result<Position> {
        let start = FALLBACK_CHAIN
            .iter()
            .position(|s| *s == self.source)
            .unwrap_or(0);

        for source in &FALLBACK_CHAIN[start..] {
            match self.read_from(*source, symbol).await {
                Ok(position) => {
                    debug!(
                        "Position {} via {:?}: {:?} {}",
                        symbol, source, position.side, position.size
                    );
                    return Ok(position);
                }
                Err(e) if e.is_not_supported() => {
                    debug!("Position source {:?} unsupported, falling back", source);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(GatewayError::NotSupported(format!("no position source for {}", symbol)).into())
    }

    async fn read_from(
        &self,
        source: PositionSource,
        symbol: &str,
    ) -> std::result::Result<Position, GatewayError> {
        match source {
            PositionSource::Direct => self.gateway.fetch_position(symbol).await,
            PositionSource::AllPositions => {
                let positions = self.gateway.fetch_positions().await?;
                Ok(positions
                    .into_iter()
                    .find(|p| p.symbol == symbol)
                    .unwrap_or_else(|| Position::flat(symbol)))
            }
            PositionSource::Balance => {
                let base = base_currency(symbol);
                let balances = self.gateway.fetch_balance().await?;
                let held = balances
                    .iter()
                    .find(|b| b.currency.eq_ignore_ascii_case(base))
                    .map(|b| b.total())
                    .unwrap_or_default();
                // Spot holdings can only be long
                Ok(Position::from_signed(
                    symbol,
                    held.max(Decimal::ZERO),
                    Decimal::ZERO,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tame_core::{Balance, Market, PositionSide};
    use tame_gateway::{GatewayOp, PaperGateway, VenueCapabilityProfile};

    fn paper() -> Arc<PaperGateway> {
        let gateway = PaperGateway::new("paper", VenueCapabilityProfile::new("stop", "stopPrice"));
        gateway.add_market(Market::new("BTC/USD", dec!(0.5), dec!(0.001)));
        Arc::new(gateway)
    }

    #[tokio::test]
    async fn test_direct_read() {
        let gateway = paper();
        gateway.set_position(Position::new("BTC/USD", PositionSide::Short, dec!(2), dec!(30000)));

        let reader = PositionReader::new(gateway, PositionSource::Direct);
        let position = reader.read("BTC/USD").await.unwrap();
        assert_eq!(position.side, PositionSide::Short);
        assert_eq!(position.size, dec!(2));
    }

    #[tokio::test]
    async fn test_falls_back_to_all_positions() {
        let gateway = paper();
        gateway.set_direct_positions(false);
        gateway.set_position(Position::new("BTC/USD", PositionSide::Long, dec!(1.5), dec!(30000)));

        let reader = PositionReader::new(gateway, PositionSource::Direct);
        let position = reader.read("BTC/USD").await.unwrap();
        assert_eq!(position.side, PositionSide::Long);
        assert_eq!(position.size, dec!(1.5));
    }

    #[tokio::test]
    async fn test_falls_back_to_balance() {
        let gateway = paper();
        gateway.set_direct_positions(false);
        gateway.fail_next(
            GatewayOp::FetchPositions,
            GatewayError::NotSupported("fetch_positions".into()),
        );
        gateway.set_balance(Balance {
            currency: "BTC".into(),
            free: dec!(0.75),
            used: dec!(0.25),
        });

        let reader = PositionReader::new(gateway, PositionSource::Direct);
        let position = reader.read("BTC/USD").await.unwrap();
        assert_eq!(position.side, PositionSide::Long);
        assert_eq!(position.size, dec!(1));
    }

    #[tokio::test]
    async fn test_missing_position_reads_flat() {
        let reader = PositionReader::new(paper(), PositionSource::AllPositions);
        assert!(reader.read("BTC/USD").await.unwrap().is_flat());
    }

    #[tokio::test]
    async fn test_network_error_is_not_masked_by_fallback() {
        let gateway = paper();
        gateway.fail_next(GatewayOp::FetchPosition, GatewayError::Network("reset".into()));

        let reader = PositionReader::new(gateway, PositionSource::Direct);
        assert!(reader.read("BTC/USD").await.is_err());
    }
}
