//! Chase Order Controller
//!
//! Keeps a resting limit order at the top of the book until it fills.
//!
//! ```text
//!   Idle ──start──► Placing ──resting──► Tracking ──order gone──► Filled
//!                      │                    │
//!                      └─ filled on arrival ┤
//!                                           ├── cancel() ──► Cancelled
//!                                           └── decay timer ─► Decayed
//! ```
//!
//! Each tick reads the open orders; once the tracked order is gone the
//! session ends. Otherwise, if the best price moved past the resting price
//! (bid rose for a buy, ask fell for a sell) the order is repriced by edit,
//! or cancel+replace on venues that cannot edit. A new order id returned by
//! the venue is adopted for subsequent ticks.
//!
//! The session lock is never held across a gateway call. `cancel` flips
//! `active` before touching the venue, and every gateway round-trip in a
//! tick is followed by a fresh look at the session, so a cancel racing a
//! reprice always wins.

use crate::config::ChaseConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tame_core::{OpenOrder, OrderBook, OrderHandle, OrderId, OrderType, Side};
use tame_gateway::VenueCapabilityProfile;
use tame_ports::{GatewayError, OrderParams, VenueGateway};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChaseState {
    Placing,
    Tracking,
    Filled,
    Cancelled,
    Decayed,
}

impl ChaseState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChaseState::Filled | ChaseState::Cancelled | ChaseState::Decayed
        )
    }
}

/// Handle to a started chase, used to drive and cancel it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChaseTicket {
    pub session_id: Uuid,
    pub symbol: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Finished(ChaseState),
}

/// Snapshot of the current (or last) chase session
#[derive(Debug, Clone, PartialEq)]
pub struct ChaseStatus {
    pub session_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub total_quantity: Decimal,
    pub order_id: Option<OrderId>,
    pub price: Option<Decimal>,
    pub state: ChaseState,
    pub active: bool,
    pub reprice_count: u32,
    pub decay_deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct ChaseSession {
    id: Uuid,
    symbol: String,
    side: Side,
    total_quantity: Decimal,
    order_id: Option<OrderId>,
    price: Option<Decimal>,
    active: bool,
    state: ChaseState,
    /// Reported once a deactivated session's order is gone
    end_reason: ChaseState,
    cancel_pending: bool,
    repricing: bool,
    /// A create is in flight; it cancels what it places if deactivated
    placing: bool,
    /// Quantity whose order was cancelled by a reprice but never replaced
    unplaced: Option<Decimal>,
    decay_deadline: Option<DateTime<Utc>>,
    reprice_count: u32,
}

impl ChaseSession {
    fn new(id: Uuid, symbol: &str, side: Side, quantity: Decimal, decay: Option<Duration>) -> Self {
        Self {
            id,
            symbol: symbol.to_string(),
            side,
            total_quantity: quantity,
            order_id: None,
            price: None,
            active: true,
            state: ChaseState::Placing,
            end_reason: ChaseState::Cancelled,
            cancel_pending: false,
            repricing: false,
            placing: true,
            unplaced: None,
            decay_deadline: decay
                .and_then(|d| chrono::Duration::from_std(d).ok())
                .map(|d| Utc::now() + d),
            reprice_count: 0,
        }
    }

    fn finish(&mut self, state: ChaseState) {
        if self.state.is_terminal() {
            return;
        }
        self.active = false;
        self.cancel_pending = false;
        self.state = state;
    }

    fn status(&self) -> ChaseStatus {
        ChaseStatus {
            session_id: self.id,
            symbol: self.symbol.clone(),
            side: self.side,
            total_quantity: self.total_quantity,
            order_id: self.order_id.clone(),
            price: self.price,
            state: self.state,
            active: self.active,
            reprice_count: self.reprice_count,
            decay_deadline: self.decay_deadline,
        }
    }
}

enum ReplaceFailure {
    /// Edit or cancel failed; the old order is as the venue left it
    Replace(GatewayError),
    /// Old order cancelled, replacement not placed
    Create(GatewayError),
}

fn session_mut(slot: &mut Option<ChaseSession>, id: Uuid) -> Result<&mut ChaseSession> {
    slot.as_mut()
        .filter(|s| s.id == id)
        .ok_or(Error::UnknownChaseSession(id))
}

/// Best price on the side a passive order joins
fn joining_price(book: &OrderBook, side: Side) -> Option<Decimal> {
    match side {
        Side::Buy => book.best_bid(),
        Side::Sell => book.best_ask(),
    }
}

#[derive(Clone)]
pub struct ChaseOrderController {
    gateway: Arc<dyn VenueGateway>,
    profile: VenueCapabilityProfile,
    tick_interval: Duration,
    slot: Arc<Mutex<Option<ChaseSession>>>,
}

impl ChaseOrderController {
    pub fn new(
        gateway: Arc<dyn VenueGateway>,
        profile: VenueCapabilityProfile,
        config: &ChaseConfig,
    ) -> Self {
        let tick_interval = config.tick_interval(profile.confirmation_latency);
        Self {
            gateway,
            profile,
            tick_interval,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Place the initial order and open a session
    ///
    /// Rejected while another session is still live. When `decay` is given
    /// a one-shot timer cancels the session once it elapses.
    pub async fn start(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        decay: Option<Duration>,
    ) -> Result<ChaseTicket> {
        if quantity <= Decimal::ZERO {
            return Err(Error::invalid("chase quantity must be greater than 0"));
        }
        if decay.is_some_and(|d| d.is_zero()) {
            return Err(Error::invalid("decay must be a positive duration"));
        }

        let id = Uuid::new_v4();
        {
            let mut slot = self.slot.lock().await;
            if let Some(current) = slot.as_ref() {
                if !current.state.is_terminal() {
                    return Err(Error::ChaseAlreadyActive {
                        symbol: current.symbol.clone(),
                        session_id: current.id,
                    });
                }
            }
            *slot = Some(ChaseSession::new(id, symbol, side, quantity, decay));
        }

        match self.place_initial(id, symbol, side, quantity).await {
            Ok(state) => {
                if let Some(decay) = decay.filter(|_| !state.is_terminal()) {
                    self.spawn_decay(id, decay);
                }
                Ok(ChaseTicket {
                    session_id: id,
                    symbol: symbol.to_string(),
                })
            }
            Err(e) => {
                let mut slot = self.slot.lock().await;
                if slot.as_ref().is_some_and(|s| s.id == id) {
                    *slot = None;
                }
                Err(e)
            }
        }
    }

    async fn place_initial(
        &self,
        id: Uuid,
        symbol: &str,
        side: Side,
        quantity: Decimal,
    ) -> Result<ChaseState> {
        let market = self.gateway.fetch_market(symbol).await?;
        let quantity = market.round_amount(quantity);
        if quantity <= Decimal::ZERO {
            return Err(Error::invalid(format!(
                "chase quantity rounds to zero for amount step {}",
                market.amount_step
            )));
        }

        let book = self.gateway.fetch_order_book(symbol).await?;
        let price = joining_price(&book, side)
            .map(|p| market.round_price(p))
            .ok_or_else(|| GatewayError::Exchange(format!("empty {} book for {}", side, symbol)))?;

        let placed = self
            .gateway
            .create_limit_order(symbol, side, quantity, price, &OrderParams::new())
            .await?;

        let mut slot = self.slot.lock().await;
        let session = session_mut(&mut slot, id)?;
        session.total_quantity = quantity;
        session.placing = false;

        let Some(handle) = placed else {
            info!("Chase {} {} {} filled on arrival @ {}", id, side, quantity, price);
            session.finish(ChaseState::Filled);
            return Ok(ChaseState::Filled);
        };

        session.order_id = Some(handle.id.clone());
        session.price = Some(price);
        if session.active {
            session.state = ChaseState::Tracking;
            info!(
                "Chase {} tracking {} {} {} @ {} (order {})",
                id, symbol, side, quantity, price, handle.id
            );
            return Ok(ChaseState::Tracking);
        }

        // Cancelled while the order was in flight
        let reason = session.end_reason;
        drop(slot);
        self.cancel_orphan(symbol, &handle.id).await;
        self.finish(id, reason).await;
        Ok(reason)
    }

    /// One pass of the tracking loop
    pub async fn tick(&self, ticket: &ChaseTicket) -> Result<TickOutcome> {
        let id = ticket.session_id;
        let session = {
            let mut slot = self.slot.lock().await;
            session_mut(&mut slot, id)?.clone()
        };

        if session.state.is_terminal() {
            return Ok(TickOutcome::Finished(session.state));
        }
        if !session.active {
            if session.cancel_pending {
                return Ok(TickOutcome::Continue);
            }
            // A previous cancel failed on the venue; try again
            let state = self.stop_session(id, session.end_reason).await?;
            return Ok(if state.is_terminal() {
                TickOutcome::Finished(state)
            } else {
                TickOutcome::Continue
            });
        }
        let Some(order_id) = session.order_id.clone() else {
            return match session.unplaced {
                Some(quantity) if session.state == ChaseState::Tracking => {
                    self.place_unplaced(id, &session.symbol, session.side, quantity)
                        .await
                }
                _ => Ok(TickOutcome::Continue),
            };
        };

        let orders = self.gateway.fetch_open_orders(&session.symbol).await?;
        let Some(order) = orders.into_iter().find(|o| o.id == order_id) else {
            return self.order_gone(id).await.map(TickOutcome::Finished);
        };

        let book = self.gateway.fetch_order_book(&session.symbol).await?;
        if !self.is_active(id).await? {
            return Ok(TickOutcome::Continue);
        }

        let Some(best) = joining_price(&book, session.side) else {
            debug!("Chase {}: empty book side, holding", id);
            return Ok(TickOutcome::Continue);
        };
        let Some(current) = order.price.or(session.price) else {
            return Ok(TickOutcome::Continue);
        };
        let moved = match session.side {
            Side::Buy => best > current,
            Side::Sell => best < current,
        };
        if !moved {
            return Ok(TickOutcome::Continue);
        }

        self.reprice(id, &order, best).await
    }

    async fn reprice(&self, id: Uuid, order: &OpenOrder, best: Decimal) -> Result<TickOutcome> {
        let market = self.gateway.fetch_market(&order.symbol).await?;
        let new_price = market.round_price(best);
        if order.price == Some(new_price) {
            return Ok(TickOutcome::Continue);
        }

        {
            let mut slot = self.slot.lock().await;
            let session = session_mut(&mut slot, id)?;
            if !session.active {
                return Ok(TickOutcome::Continue);
            }
            session.repricing = true;
        }

        debug!(
            "Chase {} repricing {} {:?} -> {}",
            id, order.id, order.price, new_price
        );
        let result = self.replace_order(order, new_price).await;

        let mut orphan = None;
        let outcome = {
            let mut slot = self.slot.lock().await;
            let session = session_mut(&mut slot, id)?;
            session.repricing = false;

            match result {
                Err(ReplaceFailure::Create(e)) => {
                    // The old order is cancelled; nothing rests until the next tick
                    session.order_id = None;
                    session.price = None;
                    if session.active {
                        warn!(
                            "Chase {} cancelled {} but its replacement failed: {}",
                            id, order.id, e
                        );
                        session.unplaced = Some(order.remaining);
                        Err(e.into())
                    } else {
                        let reason = session.end_reason;
                        session.finish(reason);
                        Ok(TickOutcome::Finished(session.state))
                    }
                }
                Err(ReplaceFailure::Replace(e)) if e.is_order_not_found() => {
                    let state = if session.active {
                        ChaseState::Filled
                    } else {
                        session.end_reason
                    };
                    session.finish(state);
                    Ok(TickOutcome::Finished(session.state))
                }
                Err(ReplaceFailure::Replace(e)) => Err(e.into()),
                Ok(None) => {
                    info!("Chase {} replacement filled on arrival", id);
                    session.finish(ChaseState::Filled);
                    Ok(TickOutcome::Finished(session.state))
                }
                Ok(Some(handle)) if session.active => {
                    if handle.id != order.id {
                        info!("Chase {} adopting order {} (was {})", id, handle.id, order.id);
                    }
                    session.order_id = Some(handle.id);
                    session.price = Some(new_price);
                    session.reprice_count += 1;
                    Ok(TickOutcome::Continue)
                }
                Ok(Some(handle)) => {
                    // A cancel landed mid-reprice; the replacement must not survive it
                    if handle.id != order.id {
                        orphan = Some((session.symbol.clone(), handle.id.clone()));
                    }
                    session.order_id = Some(handle.id);
                    let reason = session.end_reason;
                    session.finish(reason);
                    Ok(TickOutcome::Finished(session.state))
                }
            }
        };

        if let Some((symbol, order_id)) = orphan {
            self.cancel_orphan(&symbol, &order_id).await;
        }
        outcome
    }

    async fn replace_order(
        &self,
        order: &OpenOrder,
        price: Decimal,
    ) -> std::result::Result<Option<OrderHandle>, ReplaceFailure> {
        if self.profile.supports_order_edit {
            return self
                .gateway
                .edit_order(
                    &order.id,
                    &order.symbol,
                    OrderType::Limit.as_str(),
                    order.side,
                    order.remaining,
                    Some(price),
                    &OrderParams::new(),
                )
                .await
                .map(Some)
                .map_err(ReplaceFailure::Replace);
        }

        self.gateway
            .cancel_order(&order.id, &order.symbol, &OrderParams::new())
            .await
            .map_err(ReplaceFailure::Replace)?;
        self.gateway
            .create_limit_order(
                &order.symbol,
                order.side,
                order.remaining,
                price,
                &OrderParams::new(),
            )
            .await
            .map_err(ReplaceFailure::Create)
    }

    /// Re-place a quantity whose order a failed reprice left cancelled
    async fn place_unplaced(
        &self,
        id: Uuid,
        symbol: &str,
        side: Side,
        quantity: Decimal,
    ) -> Result<TickOutcome> {
        let market = self.gateway.fetch_market(symbol).await?;
        let book = self.gateway.fetch_order_book(symbol).await?;
        let Some(price) = joining_price(&book, side).map(|p| market.round_price(p)) else {
            debug!("Chase {}: empty book side, holding", id);
            return Ok(TickOutcome::Continue);
        };

        {
            let mut slot = self.slot.lock().await;
            let session = session_mut(&mut slot, id)?;
            if !session.active {
                return Ok(TickOutcome::Continue);
            }
            session.placing = true;
        }

        let result = self
            .gateway
            .create_limit_order(symbol, side, quantity, price, &OrderParams::new())
            .await;

        let mut orphan = None;
        let outcome = {
            let mut slot = self.slot.lock().await;
            let session = session_mut(&mut slot, id)?;
            session.placing = false;

            match result {
                Err(e) if session.active => Err(e.into()),
                Err(_) => {
                    let reason = session.end_reason;
                    session.finish(reason);
                    Ok(TickOutcome::Finished(session.state))
                }
                Ok(None) => {
                    info!("Chase {} re-placed order filled on arrival", id);
                    session.unplaced = None;
                    session.finish(ChaseState::Filled);
                    Ok(TickOutcome::Finished(session.state))
                }
                Ok(Some(handle)) if session.active => {
                    info!("Chase {} re-placed {} {} @ {} (order {})", id, side, quantity, price, handle.id);
                    session.unplaced = None;
                    session.order_id = Some(handle.id);
                    session.price = Some(price);
                    Ok(TickOutcome::Continue)
                }
                Ok(Some(handle)) => {
                    orphan = Some(handle.id.clone());
                    session.unplaced = None;
                    session.order_id = Some(handle.id);
                    let reason = session.end_reason;
                    session.finish(reason);
                    Ok(TickOutcome::Finished(session.state))
                }
            }
        };

        if let Some(order_id) = orphan {
            self.cancel_orphan(symbol, &order_id).await;
        }
        outcome
    }

    /// Drive the session until it ends; tick errors are logged and retried
    ///
    /// Returns `None` if the session was replaced by a newer one.
    pub async fn run(&self, ticket: ChaseTicket) -> Option<ChaseState> {
        loop {
            tokio::time::sleep(self.tick_interval).await;
            match self.tick(&ticket).await {
                Ok(TickOutcome::Continue) => {}
                Ok(TickOutcome::Finished(state)) => {
                    info!("Chase {} finished: {:?}", ticket.session_id, state);
                    return Some(state);
                }
                Err(Error::UnknownChaseSession(_)) => return None,
                Err(e) => warn!("Chase {} tick failed, retrying: {}", ticket.session_id, e),
            }
        }
    }

    pub fn spawn(&self, ticket: ChaseTicket) -> JoinHandle<Option<ChaseState>> {
        let controller = self.clone();
        tokio::spawn(async move { controller.run(ticket).await })
    }

    /// Stop chasing. An order that vanished before the cancel reached the
    /// venue is reported as `Filled`.
    pub async fn cancel(&self, session_id: Uuid) -> Result<ChaseState> {
        self.stop_session(session_id, ChaseState::Cancelled).await
    }

    pub async fn status(&self) -> Option<ChaseStatus> {
        self.slot.lock().await.as_ref().map(ChaseSession::status)
    }

    /// The live session, if any
    pub async fn active_session(&self) -> Option<Uuid> {
        self.slot
            .lock()
            .await
            .as_ref()
            .filter(|s| !s.state.is_terminal())
            .map(|s| s.id)
    }

    async fn stop_session(&self, id: Uuid, reason: ChaseState) -> Result<ChaseState> {
        let (symbol, order_id) = {
            let mut slot = self.slot.lock().await;
            let session = session_mut(&mut slot, id)?;
            if session.state.is_terminal() {
                return Ok(session.state);
            }
            session.active = false;
            if session.cancel_pending {
                return Ok(session.end_reason);
            }
            session.end_reason = reason;
            if session.order_id.is_none() {
                // An in-flight placement cancels whatever it creates
                if !session.placing {
                    session.finish(reason);
                }
                return Ok(reason);
            }
            session.cancel_pending = true;
            (session.symbol.clone(), session.order_id.clone())
        };

        let Some(order_id) = order_id else {
            return Ok(reason);
        };

        match self
            .gateway
            .cancel_order(&order_id, &symbol, &OrderParams::new())
            .await
        {
            Ok(()) => {
                info!("Chase {} {:?}: cancelled order {}", id, reason, order_id);
                self.finish(id, reason).await;
                Ok(reason)
            }
            Err(e) if e.is_order_not_found() => {
                let mut slot = self.slot.lock().await;
                let session = session_mut(&mut slot, id)?;
                let replaced = session.repricing || session.order_id.as_deref() != Some(order_id.as_str());
                if replaced {
                    // The reprice path (or the next tick) cleans up the new order
                    session.cancel_pending = false;
                    Ok(reason)
                } else {
                    info!("Chase {} order {} already gone: treating as filled", id, order_id);
                    session.finish(ChaseState::Filled);
                    Ok(session.state)
                }
            }
            Err(e) => {
                warn!("Chase {} cancel of {} failed: {}", id, order_id, e);
                if let Ok(session) = session_mut(&mut *self.slot.lock().await, id) {
                    session.cancel_pending = false;
                }
                Err(e.into())
            }
        }
    }

    async fn order_gone(&self, id: Uuid) -> Result<ChaseState> {
        let mut slot = self.slot.lock().await;
        let session = session_mut(&mut slot, id)?;
        let state = if session.active {
            ChaseState::Filled
        } else {
            session.end_reason
        };
        session.finish(state);
        info!("Chase {} order gone: {:?}", id, session.state);
        Ok(session.state)
    }

    async fn is_active(&self, id: Uuid) -> Result<bool> {
        let mut slot = self.slot.lock().await;
        Ok(session_mut(&mut slot, id)?.active)
    }

    async fn finish(&self, id: Uuid, state: ChaseState) {
        if let Ok(session) = session_mut(&mut *self.slot.lock().await, id) {
            session.finish(state);
        }
    }

    async fn cancel_orphan(&self, symbol: &str, order_id: &str) {
        match self
            .gateway
            .cancel_order(order_id, symbol, &OrderParams::new())
            .await
        {
            Ok(()) => warn!("Cancelled orphaned chase order {}", order_id),
            Err(e) if e.is_order_not_found() => debug!("Orphan {} already gone", order_id),
            Err(e) => error!("Orphaned chase order {} may still be resting: {}", order_id, e),
        }
    }

    fn spawn_decay(&self, id: Uuid, decay: Duration) {
        let controller = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(decay).await;
            match controller.stop_session(id, ChaseState::Decayed).await {
                Ok(state) => debug!("Chase {} decay timer fired: {:?}", id, state),
                Err(Error::UnknownChaseSession(_)) => {}
                Err(e) => warn!("Chase {} decay cancel failed: {}", id, e),
            }
        });
    }
}
