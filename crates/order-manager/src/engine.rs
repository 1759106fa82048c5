//! Order Engine
//!
//! Wires every controller to one venue gateway and resolves that venue's
//! capability profile once, at construction. This is the surface the
//! command dispatcher talks to.

use crate::bracket::{BracketOrderPlanner, BracketOrderRequest, BracketOrderResult};
use crate::chase::{ChaseOrderController, ChaseState, ChaseStatus, ChaseTicket};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::maintenance::{BumpReport, CancelReport, Direction, OrderMaintenance};
use crate::position::PositionReader;
use crate::range::{RangeOrderPlanner, RangeOrderRequest, RangeOrderResult};
use crate::stop::{StopOrderController, StopSpec};
use log::info;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tame_core::{Market, OpenOrder, OrderHandle, Position, Side};
use tame_gateway::{VenueCapabilityProfile, VenueCapabilityTable};
use tame_ports::VenueGateway;
use uuid::Uuid;

pub struct OrderEngine {
    gateway: Arc<dyn VenueGateway>,
    config: EngineConfig,
    profile: VenueCapabilityProfile,
    positions: PositionReader,
    stops: StopOrderController,
    chase: ChaseOrderController,
    range: RangeOrderPlanner,
    bracket: BracketOrderPlanner,
    maintenance: OrderMaintenance,
}

impl OrderEngine {
    /// Build an engine for the gateway's venue
    ///
    /// Venue rows from the config are layered over the built-in table.
    /// Fails with `UnknownVenueCapability` if the venue has no row.
    pub fn new(gateway: Arc<dyn VenueGateway>, config: EngineConfig) -> Result<Self> {
        let mut table = VenueCapabilityTable::with_defaults();
        for (venue, profile) in &config.venues {
            table.insert(venue.clone(), profile.clone());
        }
        let profile = table.lookup(gateway.venue_id())?.clone();

        info!(
            "Order engine on {}: stop type '{}', trigger field '{}', reduce-only {}",
            gateway.venue_id(),
            profile.stop_order_type_name,
            profile.trigger_price_field,
            profile.reduce_only_param().unwrap_or("unsupported")
        );

        let positions = PositionReader::new(gateway.clone(), profile.position_source);
        let stops = StopOrderController::new(gateway.clone(), profile.clone());
        let chase = ChaseOrderController::new(gateway.clone(), profile.clone(), &config.chase);
        let range = RangeOrderPlanner::new(gateway.clone(), stops.clone());
        let bracket = BracketOrderPlanner::new(
            gateway.clone(),
            stops.clone(),
            config.bracket.slippage_divisor,
        );
        let maintenance = OrderMaintenance::new(gateway.clone(), profile.clone());

        Ok(Self {
            gateway,
            config,
            profile,
            positions,
            stops,
            chase,
            range,
            bracket,
            maintenance,
        })
    }

    pub fn venue_id(&self) -> &str {
        self.gateway.venue_id()
    }

    pub fn profile(&self) -> &VenueCapabilityProfile {
        &self.profile
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn default_risk_return_threshold(&self) -> Decimal {
        self.config.risk.default_risk_return_threshold
    }

    // ---- Chase ----

    /// Start a chase and hand its loop to the runtime
    pub async fn chase(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        decay: Option<Duration>,
    ) -> Result<ChaseTicket> {
        let ticket = self.chase.start(symbol, side, quantity, decay).await?;
        self.chase.spawn(ticket.clone());
        Ok(ticket)
    }

    pub async fn cancel_chase(&self, session_id: Uuid) -> Result<ChaseState> {
        self.chase.cancel(session_id).await
    }

    pub async fn active_chase(&self) -> Option<Uuid> {
        self.chase.active_session().await
    }

    pub async fn chase_status(&self) -> Option<ChaseStatus> {
        self.chase.status().await
    }

    // ---- Stops ----

    pub async fn create_stop(&self, spec: &StopSpec) -> Result<OrderHandle> {
        self.stops.create_stop(spec).await
    }

    pub async fn update_stop(
        &self,
        symbol: &str,
        quantity: Option<Decimal>,
        trigger_price: Option<Decimal>,
    ) -> Result<OrderHandle> {
        self.stops.update_stop(symbol, quantity, trigger_price).await
    }

    pub async fn edit_stop_trigger(&self, symbol: &str, trigger_price: Decimal) -> Result<OrderHandle> {
        self.stops.edit_trigger_price(symbol, trigger_price).await
    }

    pub async fn current_stop(&self, symbol: &str) -> Result<OpenOrder> {
        self.stops.find_stop(symbol).await
    }

    // ---- Planners ----

    pub async fn submit_range_orders(&self, request: &RangeOrderRequest) -> Result<RangeOrderResult> {
        self.range.submit(request).await
    }

    pub async fn create_bracket_order(
        &self,
        request: &BracketOrderRequest,
    ) -> Result<BracketOrderResult> {
        self.bracket.submit(request).await
    }

    // ---- Maintenance ----

    pub async fn cancel_orders_by_direction(
        &self,
        symbol: &str,
        direction: Direction,
        from: Option<usize>,
        to: Option<usize>,
    ) -> Result<CancelReport> {
        self.maintenance
            .cancel_orders_by_direction(symbol, direction, from, to)
            .await
    }

    pub async fn bump_orders(&self, symbol: &str, delta: Decimal) -> Result<BumpReport> {
        self.maintenance.bump_orders(symbol, delta).await
    }

    pub async fn position(&self, symbol: &str) -> Result<Position> {
        self.positions.read(symbol).await
    }

    pub async fn market(&self, symbol: &str) -> Result<Market> {
        Ok(self.gateway.fetch_market(symbol).await?)
    }
}
