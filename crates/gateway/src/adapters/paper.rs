//! Paper venue - in-memory implementation of the `VenueGateway` port
//!
//! Keeps books, tickers, positions and resting orders per symbol and
//! emulates the quirks of a capability profile (stop naming, trigger field,
//! reduce-only support, edit support). Every call is journaled, and
//! failures can be injected per operation, so the same adapter backs the
//! runner and the controller tests.

use crate::capabilities::{VenueCapabilityProfile, VenueCapabilityTable};
use crate::error::CapabilityError;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use log::{debug, info, warn};
use rust_decimal::Decimal;
use rust_decimal::prelude::Signed;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tame_core::{
    Balance, BookLevel, Market, OpenOrder, OrderBook, OrderHandle, OrderType, Position,
    PositionSide, Side, Ticker,
};
use tame_ports::{GatewayError, GatewayResult, OrderParams, VenueGateway};

/// Gateway operations, used to target failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    FetchMarket,
    FetchOpenOrders,
    FetchPosition,
    FetchPositions,
    FetchBalance,
    FetchOrderBook,
    FetchTicker,
    CreateLimitOrder,
    CreateOrder,
    EditOrder,
    CancelOrder,
}

/// Journal entry for an order-mutating call
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    CreateLimitOrder {
        symbol: String,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    },
    CreateOrder {
        symbol: String,
        order_type: String,
        side: Side,
        quantity: Decimal,
        price: Option<Decimal>,
        params: OrderParams,
    },
    EditOrder {
        order_id: String,
        symbol: String,
        quantity: Decimal,
        price: Option<Decimal>,
        params: OrderParams,
    },
    CancelOrder {
        order_id: String,
        symbol: String,
    },
}

/// Per-symbol venue state
#[derive(Debug, Clone)]
struct MarketState {
    market: Market,
    book: OrderBook,
    last: Decimal,
    /// Signed position quantity
    position: Decimal,
    entry_price: Decimal,
    orders: Vec<OpenOrder>,
}

impl MarketState {
    fn new(market: Market) -> Self {
        Self {
            market,
            book: OrderBook::default(),
            last: Decimal::ZERO,
            position: Decimal::ZERO,
            entry_price: Decimal::ZERO,
            orders: Vec::new(),
        }
    }

    /// Marketable limit: buy at or above best ask, sell at or below best bid
    fn crosses(&self, side: Side, price: Decimal) -> bool {
        match side {
            Side::Buy => self.book.best_ask().is_some_and(|ask| price >= ask),
            Side::Sell => self.book.best_bid().is_some_and(|bid| price <= bid),
        }
    }

    fn apply_fill(&mut self, side: Side, quantity: Decimal, price: Decimal) {
        let signed = match side {
            Side::Buy => quantity,
            Side::Sell => -quantity,
        };
        let new_position = self.position + signed;

        // Average in when adding to (or opening) a position
        let adding = self.position.is_zero() || self.position.signum() == signed.signum();
        if adding && !new_position.is_zero() {
            let notional = self.position.abs() * self.entry_price + quantity * price;
            self.entry_price = notional / new_position.abs();
        } else if new_position.is_zero() {
            self.entry_price = Decimal::ZERO;
        } else if new_position.signum() != self.position.signum() {
            // Flipped through zero
            self.entry_price = price;
        }

        self.position = new_position;
        self.last = price;
    }
}

/// In-memory venue emulating a capability profile
pub struct PaperGateway {
    venue_id: String,
    profile: VenueCapabilityProfile,
    markets: DashMap<String, MarketState>,
    balances: DashMap<String, Balance>,
    order_counter: AtomicU64,
    failures: DashMap<GatewayOp, VecDeque<GatewayError>>,
    journal: Mutex<Vec<GatewayCall>>,
    /// Resting limit orders fill on placement regardless of price
    fill_limits_immediately: AtomicBool,
    /// Edits are executed as cancel+replace and return a fresh id
    edit_changes_id: AtomicBool,
    /// Venue answers single-symbol position queries
    direct_positions: AtomicBool,
}

impl PaperGateway {
    /// Paper venue emulating an explicit profile
    pub fn new(venue_id: impl Into<String>, profile: VenueCapabilityProfile) -> Self {
        Self {
            venue_id: venue_id.into(),
            profile,
            markets: DashMap::new(),
            balances: DashMap::new(),
            order_counter: AtomicU64::new(0),
            failures: DashMap::new(),
            journal: Mutex::new(Vec::new()),
            fill_limits_immediately: AtomicBool::new(false),
            edit_changes_id: AtomicBool::new(false),
            direct_positions: AtomicBool::new(true),
        }
    }

    /// Paper venue emulating one of the registered venues
    pub fn emulating(
        table: &VenueCapabilityTable,
        venue_id: &str,
    ) -> Result<Self, CapabilityError> {
        let profile = table.lookup(venue_id)?.clone();
        Ok(Self::new(venue_id, profile))
    }

    pub fn profile(&self) -> &VenueCapabilityProfile {
        &self.profile
    }

    // ---- Scenario setup ----

    pub fn add_market(&self, market: Market) {
        info!("Paper venue listing {}", market.symbol);
        self.markets
            .insert(market.symbol.clone(), MarketState::new(market));
    }

    /// Replace the top of book (single level each side)
    pub fn set_book(&self, symbol: &str, bid: Decimal, ask: Decimal) {
        if let Some(mut state) = self.markets.get_mut(symbol) {
            state.book = OrderBook {
                bids: vec![BookLevel::new(bid, Decimal::ONE)],
                asks: vec![BookLevel::new(ask, Decimal::ONE)],
            };
        }
    }

    pub fn set_last(&self, symbol: &str, last: Decimal) {
        if let Some(mut state) = self.markets.get_mut(symbol) {
            state.last = last;
        }
    }

    pub fn set_position(&self, position: Position) {
        if let Some(mut state) = self.markets.get_mut(&position.symbol) {
            state.position = match position.side {
                PositionSide::Long => position.size,
                PositionSide::Short => -position.size,
                PositionSide::Flat => Decimal::ZERO,
            };
            state.entry_price = position.entry_price;
        }
    }

    pub fn set_balance(&self, balance: Balance) {
        self.balances.insert(balance.currency.clone(), balance);
    }

    /// Place an order directly on the book, bypassing the journal
    pub fn insert_order(&self, order: OpenOrder) {
        if let Some(mut state) = self.markets.get_mut(&order.symbol) {
            state.orders.push(order);
        }
    }

    /// Fill a resting order completely at its price
    pub fn fill_order(&self, symbol: &str, order_id: &str) -> bool {
        let Some(mut state) = self.markets.get_mut(symbol) else {
            return false;
        };
        let Some(idx) = state.orders.iter().position(|o| o.id == order_id) else {
            return false;
        };
        let order = state.orders.remove(idx);
        let price = order
            .effective_price()
            .unwrap_or(state.last);
        state.apply_fill(order.side, order.remaining, price);
        info!("Paper fill {} {} {} @ {}", order.id, order.side, order.remaining, price);
        true
    }

    pub fn set_fill_limits_immediately(&self, enabled: bool) {
        self.fill_limits_immediately.store(enabled, Ordering::SeqCst);
    }

    pub fn set_edit_changes_id(&self, enabled: bool) {
        self.edit_changes_id.store(enabled, Ordering::SeqCst);
    }

    pub fn set_direct_positions(&self, enabled: bool) {
        self.direct_positions.store(enabled, Ordering::SeqCst);
    }

    /// Queue an error to be returned by the next call of `op`
    pub fn fail_next(&self, op: GatewayOp, error: GatewayError) {
        self.failures.entry(op).or_default().push_back(error);
    }

    // ---- Inspection ----

    /// Snapshot of resting orders for a symbol
    pub fn resting_orders(&self, symbol: &str) -> Vec<OpenOrder> {
        self.markets
            .get(symbol)
            .map(|s| s.orders.clone())
            .unwrap_or_default()
    }

    /// Signed position quantity for a symbol
    pub fn position_quantity(&self, symbol: &str) -> Decimal {
        self.markets
            .get(symbol)
            .map(|s| s.position)
            .unwrap_or_default()
    }

    /// Order-mutating calls in the order they were made
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.journal
            .lock()
            .map(|j| j.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn cancel_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GatewayCall::CancelOrder { .. }))
            .count()
    }

    pub fn create_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    GatewayCall::CreateOrder { .. } | GatewayCall::CreateLimitOrder { .. }
                )
            })
            .count()
    }

    // ---- Internals ----

    fn check_failure(&self, op: GatewayOp) -> GatewayResult<()> {
        if let Some(mut queue) = self.failures.get_mut(&op) {
            if let Some(error) = queue.pop_front() {
                warn!("Paper venue injecting failure on {:?}: {}", op, error);
                return Err(error);
            }
        }
        Ok(())
    }

    fn record(&self, call: GatewayCall) {
        match self.journal.lock() {
            Ok(mut journal) => journal.push(call),
            Err(poisoned) => poisoned.into_inner().push(call),
        }
    }

    fn next_order_id(&self) -> String {
        let n = self.order_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("paper-{}", n)
    }

    fn unknown_market(symbol: &str) -> GatewayError {
        GatewayError::UnknownMarket(symbol.to_string())
    }

    /// Reject reduce-only flags the emulated venue does not understand
    fn validate_params(&self, params: &OrderParams) -> GatewayResult<()> {
        if !self.profile.reduce_only_supported {
            let stray = params
                .iter()
                .any(|(k, _)| k.to_ascii_lowercase().replace('_', "") == "reduceonly");
            if stray {
                return Err(GatewayError::Rejected(
                    "reduce-only is not supported on this venue".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VenueGateway for PaperGateway {
    fn venue_id(&self) -> &str {
        &self.venue_id
    }

    async fn fetch_market(&self, symbol: &str) -> GatewayResult<Market> {
        self.check_failure(GatewayOp::FetchMarket)?;
        self.markets
            .get(symbol)
            .map(|s| s.market.clone())
            .ok_or_else(|| Self::unknown_market(symbol))
    }

    async fn fetch_open_orders(&self, symbol: &str) -> GatewayResult<Vec<OpenOrder>> {
        self.check_failure(GatewayOp::FetchOpenOrders)?;
        self.markets
            .get(symbol)
            .map(|s| s.orders.clone())
            .ok_or_else(|| Self::unknown_market(symbol))
    }

    async fn fetch_position(&self, symbol: &str) -> GatewayResult<Position> {
        self.check_failure(GatewayOp::FetchPosition)?;
        if !self.direct_positions.load(Ordering::SeqCst) {
            return Err(GatewayError::NotSupported("fetch_position".to_string()));
        }
        self.markets
            .get(symbol)
            .map(|s| Position::from_signed(symbol, s.position, s.entry_price))
            .ok_or_else(|| Self::unknown_market(symbol))
    }

    async fn fetch_positions(&self) -> GatewayResult<Vec<Position>> {
        self.check_failure(GatewayOp::FetchPositions)?;
        Ok(self
            .markets
            .iter()
            .filter(|s| !s.position.is_zero())
            .map(|s| Position::from_signed(s.key().clone(), s.position, s.entry_price))
            .collect())
    }

    async fn fetch_balance(&self) -> GatewayResult<Vec<Balance>> {
        self.check_failure(GatewayOp::FetchBalance)?;
        Ok(self.balances.iter().map(|b| b.value().clone()).collect())
    }

    async fn fetch_order_book(&self, symbol: &str) -> GatewayResult<OrderBook> {
        self.check_failure(GatewayOp::FetchOrderBook)?;
        self.markets
            .get(symbol)
            .map(|s| s.book.clone())
            .ok_or_else(|| Self::unknown_market(symbol))
    }

    async fn fetch_ticker(&self, symbol: &str) -> GatewayResult<Ticker> {
        self.check_failure(GatewayOp::FetchTicker)?;
        self.markets
            .get(symbol)
            .map(|s| Ticker {
                symbol: symbol.to_string(),
                last: s.last,
                timestamp: Utc::now(),
            })
            .ok_or_else(|| Self::unknown_market(symbol))
    }

    async fn create_limit_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        params: &OrderParams,
    ) -> GatewayResult<Option<OrderHandle>> {
        self.check_failure(GatewayOp::CreateLimitOrder)?;
        self.validate_params(params)?;
        self.record(GatewayCall::CreateLimitOrder {
            symbol: symbol.to_string(),
            side,
            quantity,
            price,
        });

        let mut state = self
            .markets
            .get_mut(symbol)
            .ok_or_else(|| Self::unknown_market(symbol))?;

        if self.fill_limits_immediately.load(Ordering::SeqCst) || state.crosses(side, price) {
            state.apply_fill(side, quantity, price);
            debug!("Paper limit {} {} @ {} filled on arrival", side, quantity, price);
            return Ok(None);
        }

        let id = self.next_order_id();
        state
            .orders
            .push(OpenOrder::limit(id.clone(), symbol, side, price, quantity));
        debug!("Paper limit {} resting: {} {} @ {}", id, side, quantity, price);

        Ok(Some(OrderHandle {
            id,
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Limit,
            quantity,
            price: Some(price),
            trigger_price: None,
        }))
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
        self.check_failure(GatewayOp::CreateOrder)?;
        self.validate_params(params)?;
        self.record(GatewayCall::CreateOrder {
            symbol: symbol.to_string(),
            order_type: order_type.to_string(),
            side,
            quantity,
            price,
            params: params.clone(),
        });

        let mut state = self
            .markets
            .get_mut(symbol)
            .ok_or_else(|| Self::unknown_market(symbol))?;
        let id = self.next_order_id();

        // A trigger parameter marks a stop whatever the type is called
        let trigger = self.profile.trigger_price_in(params);
        let kind = if trigger.is_some() || order_type == self.profile.stop_order_type_name {
            OrderType::Stop
        } else if order_type.eq_ignore_ascii_case("market") {
            OrderType::Market
        } else {
            OrderType::Limit
        };

        let handle = OrderHandle {
            id: id.clone(),
            symbol: symbol.to_string(),
            side,
            order_type: kind,
            quantity,
            price,
            trigger_price: trigger,
        };

        match kind {
            OrderType::Stop => {
                let trigger = trigger.ok_or_else(|| {
                    GatewayError::Rejected(format!(
                        "stop order requires {}",
                        self.profile.trigger_price_field
                    ))
                })?;
                let mut order = OpenOrder::stop(id, symbol, side, trigger, quantity);
                order.price = price;
                state.orders.push(order);
            }
            OrderType::Market => {
                let fill_price = match side {
                    Side::Buy => state.book.best_ask(),
                    Side::Sell => state.book.best_bid(),
                }
                .unwrap_or(state.last);
                state.apply_fill(side, quantity, fill_price);
            }
            OrderType::Limit => {
                let price = price
                    .ok_or_else(|| GatewayError::Rejected("limit order requires a price".into()))?;
                state
                    .orders
                    .push(OpenOrder::limit(id, symbol, side, price, quantity));
            }
        }

        Ok(handle)
    }

    async fn edit_order(
        &self,
        order_id: &str,
        symbol: &str,
        _order_type: &str,
        side: Side,
        quantity: Decimal,
        price: Option<Decimal>,
        params: &OrderParams,
    ) -> GatewayResult<OrderHandle> {
        self.check_failure(GatewayOp::EditOrder)?;
        self.validate_params(params)?;
        self.record(GatewayCall::EditOrder {
            order_id: order_id.to_string(),
            symbol: symbol.to_string(),
            quantity,
            price,
            params: params.clone(),
        });

        let mut state = self
            .markets
            .get_mut(symbol)
            .ok_or_else(|| Self::unknown_market(symbol))?;
        let idx = state
            .orders
            .iter()
            .position(|o| o.id == order_id)
            .ok_or_else(|| GatewayError::OrderNotFound(order_id.to_string()))?;

        let is_stop = state.orders[idx].is_stop();
        if is_stop && !self.profile.supports_stop_edit {
            return Err(GatewayError::NotSupported("edit stop order".to_string()));
        }
        if !is_stop && !self.profile.supports_order_edit {
            return Err(GatewayError::NotSupported("edit order".to_string()));
        }

        let new_id = if self.edit_changes_id.load(Ordering::SeqCst) {
            self.next_order_id()
        } else {
            order_id.to_string()
        };

        let mut order = state.orders.remove(idx);
        order.id = new_id;
        order.side = side;
        order.remaining = quantity;
        if is_stop {
            if let Some(trigger) = self.profile.trigger_price_in(params) {
                order.trigger_price = Some(trigger);
            }
            order.price = price;
        } else if let Some(price) = price {
            order.price = Some(price);
        }

        let handle = OrderHandle {
            id: order.id.clone(),
            symbol: symbol.to_string(),
            side,
            order_type: order.order_type,
            quantity,
            price: order.price,
            trigger_price: order.trigger_price,
        };

        let marketable = !is_stop
            && order
                .price
                .is_some_and(|p| state.crosses(order.side, p));
        if marketable {
            let fill_price = order.price.unwrap_or(state.last);
            state.apply_fill(order.side, order.remaining, fill_price);
            debug!("Paper edit of {} crossed the book and filled", order_id);
        } else {
            state.orders.push(order);
        }

        Ok(handle)
    }

    async fn cancel_order(
        &self,
        order_id: &str,
        symbol: &str,
        _params: &OrderParams,
    ) -> GatewayResult<()> {
        self.check_failure(GatewayOp::CancelOrder)?;
        self.record(GatewayCall::CancelOrder {
            order_id: order_id.to_string(),
            symbol: symbol.to_string(),
        });

        let mut state = self
            .markets
            .get_mut(symbol)
            .ok_or_else(|| Self::unknown_market(symbol))?;
        let before = state.orders.len();
        state.orders.retain(|o| o.id != order_id);

        if state.orders.len() == before {
            return Err(GatewayError::OrderNotFound(order_id.to_string()));
        }
        debug!("Paper cancel {}", order_id);
        Ok(())
    }
}
