use async_trait::async_trait;
use rust_decimal::Decimal;
use tame_core::{Balance, Market, OpenOrder, OrderBook, OrderHandle, Position, Side, Ticker};

use crate::error::{GatewayError, GatewayResult};
use crate::params::OrderParams;

/// Port for the unified multi-venue trading gateway
///
/// Every call is a suspension point; implementations own connectivity,
/// authentication, rate limiting and normalization of venue payloads.
/// Controllers hold an explicit handle to a gateway rather than reaching
/// for a process-wide client.
#[async_trait]
pub trait VenueGateway: Send + Sync {
    /// Venue identifier used for capability lookup (`deribit`, `phemex`, ...)
    fn venue_id(&self) -> &str;

    /// Market metadata (precision rules) for a symbol
    async fn fetch_market(&self, symbol: &str) -> GatewayResult<Market>;

    /// Resting orders for a symbol
    async fn fetch_open_orders(&self, symbol: &str) -> GatewayResult<Vec<OpenOrder>>;

    /// Direct position query for a single symbol
    async fn fetch_position(&self, symbol: &str) -> GatewayResult<Position>;

    /// All open positions; used when the venue cannot query a single symbol
    async fn fetch_positions(&self) -> GatewayResult<Vec<Position>> {
        Err(GatewayError::NotSupported("fetch_positions".to_string()))
    }

    /// Account balances; last-resort position source for spot venues
    async fn fetch_balance(&self) -> GatewayResult<Vec<Balance>> {
        Err(GatewayError::NotSupported("fetch_balance".to_string()))
    }

    /// L2 book, best level first
    async fn fetch_order_book(&self, symbol: &str) -> GatewayResult<OrderBook>;

    async fn fetch_ticker(&self, symbol: &str) -> GatewayResult<Ticker>;

    /// Place a limit order
    ///
    /// Returns `None` when the venue filled the order immediately and left
    /// nothing resting.
    async fn create_limit_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        params: &OrderParams,
    ) -> GatewayResult<Option<OrderHandle>>;

    /// Place an order of a venue-named type (e.g. `stop_market`)
    async fn create_order(
        &self,
        symbol: &str,
        order_type: &str,
        side: Side,
        quantity: Decimal,
        price: Option<Decimal>,
        params: &OrderParams,
    ) -> GatewayResult<OrderHandle>;

    /// Amend an order; the returned handle may carry a new id
    #[allow(clippy::too_many_arguments)]
    async fn edit_order(
        &self,
        order_id: &str,
        symbol: &str,
        order_type: &str,
        side: Side,
        quantity: Decimal,
        price: Option<Decimal>,
        params: &OrderParams,
    ) -> GatewayResult<OrderHandle>;

    async fn cancel_order(
        &self,
        order_id: &str,
        symbol: &str,
        params: &OrderParams,
    ) -> GatewayResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Controllers hold the gateway as a trait object in places
    fn _assert_gateway_object_safe(_: &dyn VenueGateway) {}
}
