//! Stop Order Controller
//!
//! Creates, updates and replaces protective stops. When the caller does not
//! say how much to protect or in which direction, both are inferred from the
//! live position and the resting orders:
//!
//! - **Side**: the position's closing side; if flat, the opposite of the
//!   resting limit orders; if there are none, trigger below last price means
//!   a sell stop and above means a buy stop.
//! - **Quantity**: position size plus the remaining quantity of resting
//!   limit orders that would grow the position once filled.
//!
//! Venues that cannot amend stops in place get cancel-then-recreate. A
//! failure to recreate after a successful cancel leaves the position naked
//! and is reported as `ProtectionLost`.

use crate::error::{Error, Result};
use crate::position::PositionReader;
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use std::sync::Arc;
use tame_core::{Market, OpenOrder, OrderHandle, Position, Side};
use tame_gateway::VenueCapabilityProfile;
use tame_ports::{OrderParams, VenueGateway};

/// Request for a protective stop
#[derive(Debug, Clone, PartialEq)]
pub struct StopSpec {
    pub symbol: String,
    pub trigger_price: Decimal,
    /// Inferred from position and resting orders when absent
    pub quantity: Option<Decimal>,
    /// Bypasses side inference when present
    pub side: Option<Side>,
}

impl StopSpec {
    pub fn new(symbol: impl Into<String>, trigger_price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            trigger_price,
            quantity: None,
            side: None,
        }
    }

    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_side(mut self, side: Side) -> Self {
        self.side = Some(side);
        self
    }
}

/// How an update settles the replacement quantity
#[derive(Debug, Clone, Copy)]
enum QuantityRule {
    Explicit(Decimal),
    Derive,
    KeepExisting,
}

#[derive(Clone)]
pub struct StopOrderController {
    gateway: Arc<dyn VenueGateway>,
    profile: VenueCapabilityProfile,
    positions: PositionReader,
}

impl StopOrderController {
    pub fn new(gateway: Arc<dyn VenueGateway>, profile: VenueCapabilityProfile) -> Self {
        let positions = PositionReader::new(gateway.clone(), profile.position_source);
        Self {
            gateway,
            profile,
            positions,
        }
    }

    /// Place a new protective stop
    pub async fn create_stop(&self, spec: &StopSpec) -> Result<OrderHandle> {
        validate_positive("stop price", spec.trigger_price)?;
        if let Some(quantity) = spec.quantity {
            validate_positive("quantity", quantity)?;
        }

        let symbol = spec.symbol.as_str();
        let market = self.gateway.fetch_market(symbol).await?;
        let trigger_price = market.round_price(spec.trigger_price);

        // Snapshots are only needed for whatever the caller left out
        let (position, orders) = if spec.side.is_none() || spec.quantity.is_none() {
            let orders = self.gateway.fetch_open_orders(symbol).await?;
            let position = self.positions.read(symbol).await?;
            (position, orders)
        } else {
            (Position::flat(symbol), Vec::new())
        };

        let side = match spec.side {
            Some(side) => side,
            None => self.resolve_side(symbol, trigger_price, &position, &orders).await?,
        };

        let quantity = match spec.quantity {
            Some(quantity) => market.round_amount(quantity),
            None => protected_quantity(&position, &orders, side),
        };
        if quantity <= Decimal::ZERO {
            return Err(Error::NoQuantityToProtect(symbol.to_string()));
        }

        self.place_stop(symbol, side, quantity, trigger_price).await
    }

    /// Replace the single stop on `symbol` with new quantity and/or price
    ///
    /// Omitted values are re-derived: the quantity from live position and
    /// resting orders, the trigger from the existing stop. On venues without
    /// in-place stop edits the old id is invalid after this call whether or
    /// not the replacement succeeded.
    pub async fn update_stop(
        &self,
        symbol: &str,
        quantity: Option<Decimal>,
        trigger_price: Option<Decimal>,
    ) -> Result<OrderHandle> {
        let rule = match quantity {
            Some(quantity) => {
                validate_positive("quantity", quantity)?;
                QuantityRule::Explicit(quantity)
            }
            None => QuantityRule::Derive,
        };
        self.update_with(symbol, rule, trigger_price).await
    }

    /// Move the stop trigger, keeping the existing quantity
    pub async fn edit_trigger_price(&self, symbol: &str, trigger_price: Decimal) -> Result<OrderHandle> {
        self.update_with(symbol, QuantityRule::KeepExisting, Some(trigger_price))
            .await
    }

    /// The single stop order resting on `symbol`
    pub async fn find_stop(&self, symbol: &str) -> Result<OpenOrder> {
        let orders = self.gateway.fetch_open_orders(symbol).await?;
        single_stop(symbol, orders)
    }

    async fn update_with(
        &self,
        symbol: &str,
        rule: QuantityRule,
        trigger_price: Option<Decimal>,
    ) -> Result<OrderHandle> {
        if let Some(price) = trigger_price {
            validate_positive("stop price", price)?;
        }

        let market = self.gateway.fetch_market(symbol).await?;
        let orders = self.gateway.fetch_open_orders(symbol).await?;
        let existing = single_stop(symbol, orders.clone())?;

        let trigger_price = trigger_price
            .or(existing.trigger_price)
            .map(|p| market.round_price(p))
            .ok_or_else(|| {
                Error::invalid(format!("stop {} has no trigger price to keep", existing.id))
            })?;

        let quantity = match rule {
            QuantityRule::Explicit(quantity) => market.round_amount(quantity),
            QuantityRule::KeepExisting => existing.remaining,
            QuantityRule::Derive => {
                let position = self.positions.read(symbol).await?;
                let side = self
                    .resolve_side(symbol, trigger_price, &position, &orders)
                    .await?;
                if side != existing.side {
                    return Err(Error::AmbiguousStopSide {
                        symbol: symbol.to_string(),
                        reason: format!(
                            "stop {} is a {} stop but the book now calls for {}",
                            existing.id, existing.side, side
                        ),
                    });
                }
                protected_quantity(&position, &orders, side)
            }
        };
        if quantity <= Decimal::ZERO {
            return Err(Error::NoQuantityToProtect(symbol.to_string()));
        }

        self.replace_stop(&existing, quantity, trigger_price).await
    }

    async fn replace_stop(
        &self,
        existing: &OpenOrder,
        quantity: Decimal,
        trigger_price: Decimal,
    ) -> Result<OrderHandle> {
        let symbol = existing.symbol.as_str();

        if self.profile.supports_stop_edit {
            let params = self.profile.stop_params(trigger_price);
            let handle = self
                .gateway
                .edit_order(
                    &existing.id,
                    symbol,
                    &self.profile.stop_order_type_name,
                    existing.side,
                    quantity,
                    None,
                    &params,
                )
                .await?;
            info!(
                "Stop {} amended in place: {} {} @ {}",
                handle.id, existing.side, quantity, trigger_price
            );
            return Ok(handle);
        }

        // A failed cancel aborts: never stack a second stop beside the first
        match self
            .gateway
            .cancel_order(&existing.id, symbol, &OrderParams::new())
            .await
        {
            Ok(()) => debug!("Cancelled stop {} for replacement", existing.id),
            Err(e) if e.is_order_not_found() => {
                info!("Stop {} already gone, recreating", existing.id)
            }
            Err(e) => {
                warn!("Cancel of stop {} failed, keeping it: {}", existing.id, e);
                return Err(e.into());
            }
        }

        match self
            .place_stop(symbol, existing.side, quantity, trigger_price)
            .await
        {
            Ok(handle) => {
                info!("Stop {} replaced by {}", existing.id, handle.id);
                Ok(handle)
            }
            Err(Error::Gateway(source)) => {
                error!(
                    "PROTECTION LOST on {}: stop {} cancelled, replacement failed: {}",
                    symbol, existing.id, source
                );
                Err(Error::ProtectionLost {
                    symbol: symbol.to_string(),
                    cancelled_order_id: existing.id.clone(),
                    source,
                })
            }
            Err(other) => Err(other),
        }
    }

    /// Submit a stop with fully resolved side, quantity and trigger
    pub(crate) async fn place_stop(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        trigger_price: Decimal,
    ) -> Result<OrderHandle> {
        let params = self.profile.stop_params(trigger_price);
        let handle = self
            .gateway
            .create_order(
                symbol,
                &self.profile.stop_order_type_name,
                side,
                quantity,
                None,
                &params,
            )
            .await?;

        info!(
            "Stop {} placed: {} {} {} @ {}",
            handle.id, symbol, side, quantity, trigger_price
        );
        Ok(handle)
    }

    async fn resolve_side(
        &self,
        symbol: &str,
        trigger_price: Decimal,
        position: &Position,
        orders: &[OpenOrder],
    ) -> Result<Side> {
        if let Some(side) = position.side.closing_side() {
            return Ok(side);
        }

        let mut limits = orders.iter().filter(|o| o.is_resting_limit());
        if let Some(first) = limits.next() {
            if limits.any(|o| o.side != first.side) {
                return Err(Error::AmbiguousStopSide {
                    symbol: symbol.to_string(),
                    reason: "flat with resting limit orders on both sides".to_string(),
                });
            }
            return Ok(first.side.opposite());
        }

        let last = self.gateway.fetch_ticker(symbol).await?.last;
        side_from_last_price(symbol, trigger_price, last)
    }

    pub fn profile(&self) -> &VenueCapabilityProfile {
        &self.profile
    }
}

/// Position size plus resting limits on the side the stop would close
pub fn protected_quantity(position: &Position, orders: &[OpenOrder], stop_side: Side) -> Decimal {
    let pending: Decimal = orders
        .iter()
        .filter(|o| o.is_resting_limit() && o.side == stop_side.opposite())
        .map(|o| o.remaining)
        .sum();
    position.size + pending
}

fn side_from_last_price(symbol: &str, trigger_price: Decimal, last: Decimal) -> Result<Side> {
    if trigger_price < last {
        Ok(Side::Sell)
    } else if trigger_price > last {
        Ok(Side::Buy)
    } else {
        Err(Error::AmbiguousStopSide {
            symbol: symbol.to_string(),
            reason: format!("trigger {} equals last price", trigger_price),
        })
    }
}

fn single_stop(symbol: &str, orders: Vec<OpenOrder>) -> Result<OpenOrder> {
    let mut stops: Vec<OpenOrder> = orders.into_iter().filter(|o| o.is_stop()).collect();
    match stops.len() {
        0 => Err(Error::NoStopOrder(symbol.to_string())),
        1 => Ok(stops.remove(0)),
        count => Err(Error::MultipleStopOrders {
            symbol: symbol.to_string(),
            count,
        }),
    }
}

fn validate_positive(what: &str, value: Decimal) -> Result<()> {
    if value <= Decimal::ZERO {
        return Err(Error::invalid(format!("{} must be greater than 0", what)));
    }
    Ok(())
}

/// Round a planner-computed stop to the market before submission
pub(crate) fn round_stop(market: &Market, quantity: Decimal, trigger: Decimal) -> (Decimal, Decimal) {
    (market.round_amount(quantity), market.round_price(trigger))
}
