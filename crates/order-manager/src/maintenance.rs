//! Order Maintenance
//!
//! Bulk cleanup of the resting book: cancel a slice of limit orders counted
//! from the top or bottom of the price ladder, or shift every order by a
//! fixed price delta.

use crate::error::{Error, Result};
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tame_core::{Market, OpenOrder, OrderHandle, OrderId, OrderType};
use tame_gateway::VenueCapabilityProfile;
use tame_ports::{GatewayError, OrderParams, VenueGateway};

/// Which end of the price ladder selections count from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Highest price first
    Top,
    /// Lowest price first
    Bottom,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "top" => Ok(Direction::Top),
            "bottom" => Ok(Direction::Bottom),
            other => Err(format!("unknown direction '{}' (expected top or bottom)", other)),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Top => write!(f, "top"),
            Direction::Bottom => write!(f, "bottom"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CancelReport {
    pub cancelled: Vec<OrderId>,
    /// Filled or cancelled elsewhere before we got to them
    pub already_gone: Vec<OrderId>,
}

impl CancelReport {
    pub fn count(&self) -> usize {
        self.cancelled.len() + self.already_gone.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BumpReport {
    pub bumped: Vec<OrderHandle>,
    pub skipped: Vec<(OrderId, String)>,
}

pub struct OrderMaintenance {
    gateway: Arc<dyn VenueGateway>,
    profile: VenueCapabilityProfile,
}

impl OrderMaintenance {
    pub fn new(gateway: Arc<dyn VenueGateway>, profile: VenueCapabilityProfile) -> Self {
        Self { gateway, profile }
    }

    /// Cancel resting limit orders `from..=to`, 1-indexed from `direction`
    ///
    /// Stops are never touched. `to` is clamped to the number of orders; a
    /// selection past the end cancels nothing.
    pub async fn cancel_orders_by_direction(
        &self,
        symbol: &str,
        direction: Direction,
        from: Option<usize>,
        to: Option<usize>,
    ) -> Result<CancelReport> {
        let from = from.unwrap_or(1);
        if from == 0 {
            return Err(Error::invalid("range start is 1-indexed"));
        }
        if let Some(to) = to {
            if to < from {
                return Err(Error::invalid(format!(
                    "range end {} is before start {}",
                    to, from
                )));
            }
        }

        let orders = self.gateway.fetch_open_orders(symbol).await?;
        let ladder = sorted_limits(orders, direction);
        let end = to.unwrap_or(ladder.len()).min(ladder.len());
        let selection = if from > end { &[][..] } else { &ladder[from - 1..end] };

        let mut report = CancelReport::default();
        for order in selection {
            match self
                .gateway
                .cancel_order(&order.id, symbol, &OrderParams::new())
                .await
            {
                Ok(()) => report.cancelled.push(order.id.clone()),
                Err(e) if e.is_order_not_found() => {
                    debug!("Order {} already gone", order.id);
                    report.already_gone.push(order.id.clone());
                }
                Err(source) => {
                    return Err(Error::BatchInterrupted {
                        submitted: report.count(),
                        total: selection.len(),
                        source,
                    });
                }
            }
        }

        info!(
            "Cancelled {} {} orders on {} ({} already gone)",
            report.cancelled.len(),
            direction,
            symbol,
            report.already_gone.len()
        );
        Ok(report)
    }

    /// Shift every resting order by `delta`: limit price for limits,
    /// trigger price for stops
    pub async fn bump_orders(&self, symbol: &str, delta: Decimal) -> Result<BumpReport> {
        if delta.is_zero() {
            return Err(Error::invalid("price delta must not be zero"));
        }

        let market = self.gateway.fetch_market(symbol).await?;
        let orders = self.gateway.fetch_open_orders(symbol).await?;
        let total = orders.len();
        let mut report = BumpReport::default();

        for order in orders {
            let outcome = if order.is_stop() {
                self.bump_stop(&market, &order, delta).await
            } else if order.order_type == OrderType::Limit {
                self.bump_limit(&market, &order, delta).await
            } else {
                Ok(Bumped::Skipped(format!("{} orders cannot be bumped", order.order_type.as_str())))
            };

            match outcome {
                Ok(Bumped::Done(handle)) => report.bumped.push(handle),
                Ok(Bumped::Skipped(reason)) => {
                    debug!("Skipping {}: {}", order.id, reason);
                    report.skipped.push((order.id, reason));
                }
                Err(BumpFailure::Gateway(e)) if e.is_not_supported() || e.is_order_not_found() => {
                    report.skipped.push((order.id, e.to_string()));
                }
                Err(BumpFailure::Dropped { price, source }) => {
                    error!(
                        "Bump cancelled {} on {} but could not re-place {} {} @ {}: {}",
                        order.id, symbol, order.side, order.remaining, price, source
                    );
                    return Err(Error::ReplacementLost {
                        symbol: symbol.to_string(),
                        cancelled_order_id: order.id,
                        side: order.side,
                        quantity: order.remaining,
                        price,
                        bumped: report.bumped.len(),
                        source,
                    });
                }
                Err(BumpFailure::Gateway(source)) => {
                    warn!("Bump of {} failed: {}", order.id, source);
                    return Err(Error::BatchInterrupted {
                        submitted: report.bumped.len(),
                        total,
                        source,
                    });
                }
            }
        }

        info!(
            "Bumped {} orders on {} by {} ({} skipped)",
            report.bumped.len(),
            symbol,
            delta,
            report.skipped.len()
        );
        Ok(report)
    }

    async fn bump_stop(
        &self,
        market: &Market,
        order: &OpenOrder,
        delta: Decimal,
    ) -> std::result::Result<Bumped, BumpFailure> {
        if !self.profile.supports_stop_edit {
            return Ok(Bumped::Skipped("venue cannot edit stop orders".to_string()));
        }
        let Some(trigger) = order.trigger_price else {
            return Ok(Bumped::Skipped("stop without trigger price".to_string()));
        };
        let Some(new_trigger) = trigger.checked_add(delta).map(|t| market.round_price(t)) else {
            return Ok(Bumped::Skipped("trigger out of range".to_string()));
        };
        if new_trigger <= Decimal::ZERO {
            return Ok(Bumped::Skipped(format!("trigger would become {}", new_trigger)));
        }

        let params = self.profile.stop_params(new_trigger);
        let handle = self
            .gateway
            .edit_order(
                &order.id,
                &order.symbol,
                &self.profile.stop_order_type_name,
                order.side,
                order.remaining,
                order.price,
                &params,
            )
            .await?;
        Ok(Bumped::Done(handle))
    }

    async fn bump_limit(
        &self,
        market: &Market,
        order: &OpenOrder,
        delta: Decimal,
    ) -> std::result::Result<Bumped, BumpFailure> {
        let Some(price) = order.price else {
            return Ok(Bumped::Skipped("limit without price".to_string()));
        };
        let Some(new_price) = price.checked_add(delta).map(|p| market.round_price(p)) else {
            return Ok(Bumped::Skipped("price out of range".to_string()));
        };
        if new_price <= Decimal::ZERO {
            return Ok(Bumped::Skipped(format!("price would become {}", new_price)));
        }

        if self.profile.supports_order_edit {
            let handle = self
                .gateway
                .edit_order(
                    &order.id,
                    &order.symbol,
                    OrderType::Limit.as_str(),
                    order.side,
                    order.remaining,
                    Some(new_price),
                    &OrderParams::new(),
                )
                .await?;
            return Ok(Bumped::Done(handle));
        }

        // Cancel+replace; a vanished order is left alone
        self.gateway
            .cancel_order(&order.id, &order.symbol, &OrderParams::new())
            .await?;
        let replaced = self
            .gateway
            .create_limit_order(
                &order.symbol,
                order.side,
                order.remaining,
                new_price,
                &OrderParams::new(),
            )
            .await
            .map_err(|source| BumpFailure::Dropped {
                price: new_price,
                source,
            })?;
        match replaced {
            Some(handle) => Ok(Bumped::Done(handle)),
            None => Ok(Bumped::Skipped("replacement filled on arrival".to_string())),
        }
    }
}

enum Bumped {
    Done(OrderHandle),
    Skipped(String),
}

enum BumpFailure {
    Gateway(GatewayError),
    /// Cancelled for a cancel+replace, replacement not placed
    Dropped { price: Decimal, source: GatewayError },
}

impl From<GatewayError> for BumpFailure {
    fn from(e: GatewayError) -> Self {
        BumpFailure::Gateway(e)
    }
}

/// Resting limits only, ordered from the requested end of the ladder
fn sorted_limits(orders: Vec<OpenOrder>, direction: Direction) -> Vec<OpenOrder> {
    let mut limits: Vec<OpenOrder> = orders
        .into_iter()
        .filter(|o| o.is_resting_limit())
        .collect();
    limits.sort_by_key(|o| o.price.unwrap_or_default());
    if direction == Direction::Top {
        limits.reverse();
    }
    limits
}
