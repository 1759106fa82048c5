//! Order Engine Integration Test
//!
//! Drives the engine against the paper venue end to end:
//! 1. Protective stop placement per venue quirks
//! 2. Stop maintenance as the position grows
//! 3. Range entry followed by stop updates once entries fill
//! 4. Chase lifecycle under the real tick loop
//! 5. A cancel racing a reprice that changed the order id

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tame_core::{
    Market, OpenOrder, OrderBook, OrderHandle, Position, PositionSide, Side, Ticker,
};
use tame_gateway::{GatewayCall, PaperGateway, VenueCapabilityTable};
use tame_order_manager::{
    ChaseOrderController, ChaseState, ChaseConfig, EngineConfig, Error, ErrorKind, OrderEngine,
    RangeOrderRequest, StopSpec, TickOutcome,
};
use tame_ports::{GatewayResult, OrderParams, VenueGateway};
use uuid::Uuid;

const BTC: &str = "BTC/USD";

fn paper(venue: &str) -> Arc<PaperGateway> {
    let _ = env_logger::builder().is_test(true).try_init();
    let gateway = Arc::new(
        PaperGateway::emulating(&VenueCapabilityTable::with_defaults(), venue).unwrap(),
    );
    gateway.add_market(Market::new(BTC, dec!(0.5), dec!(0.001)));
    gateway.set_book(BTC, dec!(29990), dec!(30010));
    gateway.set_last(BTC, dec!(30000));
    gateway
}

fn engine(gateway: &Arc<PaperGateway>) -> OrderEngine {
    OrderEngine::new(gateway.clone(), EngineConfig::default()).unwrap()
}

#[tokio::test]
async fn test_phemex_stop_for_long_position() {
    let gateway = paper("phemex");
    gateway.set_position(Position::new(BTC, PositionSide::Long, dec!(1), dec!(29500)));
    let engine = engine(&gateway);

    let stop = engine
        .create_stop(&StopSpec::new(BTC, dec!(28000)))
        .await
        .unwrap();

    assert_eq!(stop.side, Side::Sell);
    assert_eq!(stop.quantity, dec!(1));

    let calls = gateway.calls();
    assert_eq!(calls.len(), 1);
    let GatewayCall::CreateOrder { order_type, params, .. } = &calls[0] else {
        panic!("expected a stop order, got {:?}", calls[0]);
    };
    assert_eq!(order_type, "stop");
    assert_eq!(params.get_decimal("stopPrice"), Some(dec!(28000)));
    assert_eq!(params.iter().count(), 1);
}

#[tokio::test]
async fn test_stop_tracks_position_and_pending_entries() {
    let gateway = paper("deribit");
    let engine = engine(&gateway);
    gateway.set_position(Position::new(BTC, PositionSide::Short, dec!(2), dec!(30500)));
    gateway.insert_order(OpenOrder::limit("e1", BTC, Side::Sell, dec!(30500), dec!(0.5)));
    gateway.insert_order(OpenOrder::limit("tp", BTC, Side::Buy, dec!(27000), dec!(2)));

    let stop = engine
        .create_stop(&StopSpec::new(BTC, dec!(31500)))
        .await
        .unwrap();
    assert_eq!(stop.side, Side::Buy);
    assert_eq!(stop.quantity, dec!(2.5));

    // The pending entry fills: re-deriving picks up the larger position
    gateway.fill_order(BTC, "e1");
    let stop = engine.update_stop(BTC, None, None).await.unwrap();
    assert_eq!(stop.quantity, dec!(2.5));
    assert_eq!(stop.trigger_price, Some(dec!(31500)));

    let stops: Vec<OpenOrder> = gateway
        .resting_orders(BTC)
        .into_iter()
        .filter(|o| o.is_stop())
        .collect();
    assert_eq!(stops.len(), 1);
    assert_eq!(stops[0].id, stop.id);
}

#[tokio::test]
async fn test_multiple_stops_touch_nothing() {
    let gateway = paper("paper");
    gateway.insert_order(OpenOrder::stop("s1", BTC, Side::Sell, dec!(28000), dec!(1)));
    gateway.insert_order(OpenOrder::stop("s2", BTC, Side::Sell, dec!(27500), dec!(1)));
    let engine = engine(&gateway);

    let err = engine.edit_stop_trigger(BTC, dec!(28200)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StateConflict);
    assert_eq!(gateway.cancel_count(), 0);
    assert_eq!(gateway.create_count(), 0);
}

#[tokio::test]
async fn test_range_then_stop_follows_fills() {
    let gateway = paper("paper");
    let engine = engine(&gateway);

    let request = RangeOrderRequest {
        symbol: BTC.to_string(),
        side: Side::Buy,
        start_price: dec!(29000),
        end_price: dec!(29500),
        num_orders: 2,
        total_capital_to_risk: dec!(10000),
        risk_percentage: dec!(2),
        stop_price: dec!(28500),
        take_profit_price: dec!(32000),
        risk_return_threshold: dec!(1),
    };
    let result = engine.submit_range_orders(&request).await.unwrap();

    // 1% of 10000 over distances 500 and 1000
    assert_eq!(result.entries[0].quantity, dec!(0.2));
    assert_eq!(result.entries[1].quantity, dec!(0.1));
    assert_eq!(result.stop.quantity, dec!(0.3));

    // First level fills; the ladder stop still covers position + remaining level
    let first = result.entries[0].order.clone().unwrap();
    gateway.fill_order(BTC, &first.id);
    let stop = engine.update_stop(BTC, None, None).await.unwrap();
    assert_eq!(stop.quantity, dec!(0.3));
    assert_eq!(stop.side, Side::Sell);
}

#[tokio::test]
async fn test_protection_lost_is_critical() {
    let gateway = paper("paper");
    gateway.set_position(Position::new(BTC, PositionSide::Long, dec!(1), dec!(30000)));
    gateway.insert_order(OpenOrder::stop("s1", BTC, Side::Sell, dec!(28000), dec!(1)));
    gateway.fail_next(
        tame_gateway::GatewayOp::CreateOrder,
        tame_ports::GatewayError::Network("timeout".into()),
    );
    let engine = engine(&gateway);

    let err = engine.edit_stop_trigger(BTC, dec!(28500)).await.unwrap_err();

    assert!(err.is_critical());
    assert!(err.to_string().starts_with("PROTECTION LOST"));
    assert!(gateway.resting_orders(BTC).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_chase_follows_market_until_filled() {
    let gateway = paper("paper");
    let engine = engine(&gateway);

    let ticket = engine.chase(BTC, Side::Buy, dec!(0.5), None).await.unwrap();
    assert_eq!(engine.active_chase().await, Some(ticket.session_id));

    gateway.set_book(BTC, dec!(30020), dec!(30030));
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let status = engine.chase_status().await.unwrap();
    assert_eq!(status.price, Some(dec!(30020)));
    assert_eq!(status.reprice_count, 1);

    gateway.fill_order(BTC, status.order_id.as_deref().unwrap());
    tokio::time::sleep(Duration::from_secs(1)).await;

    let status = engine.chase_status().await.unwrap();
    assert_eq!(status.state, ChaseState::Filled);
    assert!(!status.active);
    assert_eq!(gateway.position_quantity(BTC), dec!(0.5));
    assert_eq!(engine.active_chase().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_chase_decay_ends_within_one_tick() {
    let gateway = paper("paper");
    let engine = engine(&gateway);

    engine
        .chase(BTC, Side::Sell, dec!(1), Some(Duration::from_secs(5)))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(6)).await;

    let status = engine.chase_status().await.unwrap();
    assert_eq!(status.state, ChaseState::Decayed);
    assert!(gateway.resting_orders(BTC).is_empty());
}

#[tokio::test]
async fn test_cancel_chase_on_filled_order() {
    let gateway = paper("paper");
    let engine = engine(&gateway);
    let ticket = engine.chase(BTC, Side::Buy, dec!(1), None).await.unwrap();
    let order_id = engine.chase_status().await.unwrap().order_id.unwrap();
    gateway.fill_order(BTC, &order_id);

    let state = engine.cancel_chase(ticket.session_id).await.unwrap();
    assert_eq!(state, ChaseState::Filled);
}

#[tokio::test]
async fn test_second_chase_rejected() {
    let gateway = paper("paper");
    let engine = engine(&gateway);
    engine.chase(BTC, Side::Buy, dec!(1), None).await.unwrap();

    let err = engine.chase(BTC, Side::Buy, dec!(1), None).await.unwrap_err();
    assert!(matches!(err, Error::ChaseAlreadyActive { .. }));
}

/// Paper venue that lets a chase cancel land right after an edit
struct RacingGateway {
    inner: Arc<PaperGateway>,
    racer: OnceLock<(ChaseOrderController, Uuid)>,
}

#[async_trait]
impl VenueGateway for RacingGateway {
    fn venue_id(&self) -> &str {
        self.inner.venue_id()
    }

    async fn fetch_market(&self, symbol: &str) -> GatewayResult<Market> {
        self.inner.fetch_market(symbol).await
    }

    async fn fetch_open_orders(&self, symbol: &str) -> GatewayResult<Vec<OpenOrder>> {
        self.inner.fetch_open_orders(symbol).await
    }

    async fn fetch_position(&self, symbol: &str) -> GatewayResult<Position> {
        self.inner.fetch_position(symbol).await
    }

    async fn fetch_order_book(&self, symbol: &str) -> GatewayResult<OrderBook> {
        self.inner.fetch_order_book(symbol).await
    }

    async fn fetch_ticker(&self, symbol: &str) -> GatewayResult<Ticker> {
        self.inner.fetch_ticker(symbol).await
    }

    async fn create_limit_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        params: &OrderParams,
    ) -> GatewayResult<Option<OrderHandle>> {
        self.inner
            .create_limit_order(symbol, side, quantity, price, params)
            .await
    }

    async fn create_order(
        &self,
        symbol: &str,
        order_type: &str,
        side: Side,
        quantity: Decimal,
        price: Option<Decimal>,
        params: &OrderParams,
    ) -> GatewayResult<OrderHandle> {
        self.inner
            .create_order(symbol, order_type, side, quantity, price, params)
            .await
    }

    async fn edit_order(
        &self,
        order_id: &str,
        symbol: &str,
        order_type: &str,
        side: Side,
        quantity: Decimal,
        price: Option<Decimal>,
        params: &OrderParams,
    ) -> GatewayResult<OrderHandle> {
        let edited = self
            .inner
            .edit_order(order_id, symbol, order_type, side, quantity, price, params)
            .await;
        if let Some((chase, session_id)) = self.racer.get() {
            let _ = chase.cancel(*session_id).await;
        }
        edited
    }

    async fn cancel_order(
        &self,
        order_id: &str,
        symbol: &str,
        params: &OrderParams,
    ) -> GatewayResult<()> {
        self.inner.cancel_order(order_id, symbol, params).await
    }
}

#[tokio::test]
async fn test_cancel_racing_reprice_leaves_no_orphan() {
    let inner = paper("paper");
    inner.set_edit_changes_id(true);
    let gateway = Arc::new(RacingGateway {
        inner: inner.clone(),
        racer: OnceLock::new(),
    });
    let chase = ChaseOrderController::new(
        gateway.clone(),
        inner.profile().clone(),
        &ChaseConfig::default(),
    );

    let ticket = chase.start(BTC, Side::Buy, dec!(1), None).await.unwrap();
    let _ = gateway.racer.set((chase.clone(), ticket.session_id));

    inner.set_book(BTC, dec!(30000), dec!(30020));
    let outcome = chase.tick(&ticket).await.unwrap();

    assert_eq!(outcome, TickOutcome::Finished(ChaseState::Cancelled));
    assert!(inner.resting_orders(BTC).is_empty());
    assert_eq!(chase.status().await.unwrap().state, ChaseState::Cancelled);
}

#[tokio::test]
async fn test_user_input_errors_attempt_nothing() {
    let gateway = paper("paper");
    let engine = engine(&gateway);

    let err = engine
        .chase(BTC, Side::Buy, Decimal::ZERO, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UserInput);

    let err = engine.bump_orders(BTC, Decimal::ZERO).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UserInput);

    assert!(gateway.calls().is_empty());
}
