//! Bracket Order Planner
//!
//! One limit entry and one protective stop, sized from a risk budget. The
//! computed size is divided by a slippage allowance so that a worse fill on
//! the entry still keeps the loss at the stop within budget.

use crate::error::{Error, Result};
use crate::risk::{RiskPlan, ensure_protective_stop, out_of_range, validate_budget};
use crate::stop::{StopOrderController, round_stop};
use log::{info, warn};
use rust_decimal::Decimal;
use std::sync::Arc;
use tame_core::{Market, OrderHandle, Side};
use tame_ports::{OrderParams, VenueGateway};

#[derive(Debug, Clone, PartialEq)]
pub struct BracketOrderRequest {
    pub symbol: String,
    pub side: Side,
    pub entry_price: Decimal,
    pub stop_price: Decimal,
    pub take_profit_price: Decimal,
    pub total_capital_to_risk: Decimal,
    pub risk_percentage: Decimal,
    pub risk_return_threshold: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BracketPlan {
    pub risk: RiskPlan,
    /// Entry size after the slippage allowance and amount-step rounding
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub stop_price: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BracketOrderResult {
    /// `None` when the entry filled on arrival
    pub entry: Option<OrderHandle>,
    pub stop: OrderHandle,
    pub quantity: Decimal,
}

pub fn plan_bracket(
    request: &BracketOrderRequest,
    market: &Market,
    slippage_divisor: Decimal,
) -> Result<BracketPlan> {
    validate_budget(
        request.total_capital_to_risk,
        request.risk_percentage,
        request.risk_return_threshold,
    )?;
    if request.entry_price <= Decimal::ZERO
        || request.stop_price <= Decimal::ZERO
        || request.take_profit_price <= Decimal::ZERO
    {
        return Err(Error::invalid("bracket prices must be greater than 0"));
    }
    if slippage_divisor <= Decimal::ZERO {
        return Err(Error::invalid("slippage divisor must be greater than 0"));
    }

    let entry_price = market.round_price(request.entry_price);
    ensure_protective_stop(request.side, entry_price, request.stop_price)?;

    let risk = RiskPlan::compute(
        request.total_capital_to_risk,
        request.risk_percentage,
        entry_price,
        request.stop_price,
        request.take_profit_price,
    )?;
    risk.ensure_ratio_above(request.risk_return_threshold)?;

    let adjusted = risk
        .position_size
        .checked_div(slippage_divisor)
        .ok_or_else(|| out_of_range("slippage-adjusted size", entry_price))?;
    let (quantity, stop_price) = round_stop(market, adjusted, request.stop_price);
    if quantity <= Decimal::ZERO {
        return Err(Error::invalid(format!(
            "bracket size rounds to zero for amount step {}",
            market.amount_step
        )));
    }

    Ok(BracketPlan {
        risk,
        quantity,
        entry_price,
        stop_price,
    })
}

pub struct BracketOrderPlanner {
    gateway: Arc<dyn VenueGateway>,
    stops: StopOrderController,
    slippage_divisor: Decimal,
}

impl BracketOrderPlanner {
    pub fn new(
        gateway: Arc<dyn VenueGateway>,
        stops: StopOrderController,
        slippage_divisor: Decimal,
    ) -> Self {
        Self {
            gateway,
            stops,
            slippage_divisor,
        }
    }

    pub async fn submit(&self, request: &BracketOrderRequest) -> Result<BracketOrderResult> {
        let symbol = request.symbol.as_str();
        let market = self.gateway.fetch_market(symbol).await?;
        let plan = plan_bracket(request, &market, self.slippage_divisor)?;

        info!(
            "Bracket {} {} {} @ {}, stop @ {}, ratio {}",
            symbol,
            request.side,
            plan.quantity,
            plan.entry_price,
            plan.stop_price,
            plan.risk.risk_return_ratio.round_dp(2)
        );

        // Nothing is resting yet: a failed entry is a plain gateway error
        let entry = self
            .gateway
            .create_limit_order(
                symbol,
                request.side,
                plan.quantity,
                plan.entry_price,
                &OrderParams::new(),
            )
            .await?;

        let stop = match self
            .stops
            .place_stop(symbol, request.side.opposite(), plan.quantity, plan.stop_price)
            .await
        {
            Ok(stop) => stop,
            Err(Error::Gateway(source)) => {
                warn!("Bracket {} entry placed without a stop: {}", symbol, source);
                return Err(Error::BatchInterrupted {
                    submitted: 1,
                    total: 2,
                    source,
                });
            }
            Err(other) => return Err(other),
        };

        Ok(BracketOrderResult {
            entry,
            stop,
            quantity: plan.quantity,
        })
    }
}
