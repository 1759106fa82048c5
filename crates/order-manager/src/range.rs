//! Range Order Planner
//!
//! Spreads an entry across evenly spaced limit orders between two prices and
//! protects the whole ladder with one stop.
//!
//! ```text
//!   end   ── limit n      risk% / n each
//!   ...   ── limit 2
//!   start ── limit 1
//!   stop  ── protective stop, sized from the sum of all levels
//! ```
//!
//! Every level is priced, sized and checked before the first order is sent.
//! A failure after submission started is reported as `BatchInterrupted`;
//! orders already resting are left in place.

use crate::error::{Error, Result};
use crate::risk::{
    RiskPlan, calculate_risk_return_ratio, ensure_protective_stop, ensure_ratio_above,
    out_of_range, validate_budget,
};
use crate::stop::{StopOrderController, round_stop};
use log::{info, warn};
use rust_decimal::Decimal;
use std::sync::Arc;
use tame_core::{Market, OrderHandle, Side};
use tame_ports::{OrderParams, VenueGateway};

#[derive(Debug, Clone, PartialEq)]
pub struct RangeOrderRequest {
    pub symbol: String,
    pub side: Side,
    pub start_price: Decimal,
    pub end_price: Decimal,
    pub num_orders: usize,
    pub total_capital_to_risk: Decimal,
    /// Shared by all levels in equal parts
    pub risk_percentage: Decimal,
    pub stop_price: Decimal,
    pub take_profit_price: Decimal,
    pub risk_return_threshold: Decimal,
}

/// Validated ladder, ready for submission
#[derive(Debug, Clone, PartialEq)]
pub struct RangePlan {
    pub levels: Vec<RiskPlan>,
    pub stop_side: Side,
    pub stop_quantity: Decimal,
    pub stop_price: Decimal,
    /// Size-weighted across all levels
    pub average_entry: Decimal,
    pub aggregate_ratio: Decimal,
}

impl RangePlan {
    pub fn prices(&self) -> Vec<Decimal> {
        self.levels.iter().map(|l| l.entry_price).collect()
    }
}

/// A submitted ladder level; `order` is `None` when it filled on arrival
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedEntry {
    pub price: Decimal,
    pub quantity: Decimal,
    pub order: Option<OrderHandle>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeOrderResult {
    pub entries: Vec<PlacedEntry>,
    pub stop: OrderHandle,
}

/// Evenly spaced entry prices, rounded to the market tick
pub fn range_levels(start: Decimal, end: Decimal, num_orders: usize, market: &Market) -> Result<Vec<Decimal>> {
    match num_orders {
        0 => Err(Error::invalid("number of orders must be at least 1")),
        1 => Ok(vec![market.round_price(start)]),
        n => {
            let step = end
                .checked_sub(start)
                .and_then(|span| span.checked_div(Decimal::from(n - 1)))
                .ok_or_else(|| out_of_range("range step", start))?;
            (0..n)
                .map(|i| {
                    step.checked_mul(Decimal::from(i))
                        .and_then(|offset| start.checked_add(offset))
                        .map(|price| market.round_price(price))
                        .ok_or_else(|| out_of_range("range level", start))
                })
                .collect()
        }
    }
}

/// Price, size and validate every level without touching the venue
pub fn plan_range(request: &RangeOrderRequest, market: &Market) -> Result<RangePlan> {
    validate_budget(
        request.total_capital_to_risk,
        request.risk_percentage,
        request.risk_return_threshold,
    )?;
    if request.start_price <= Decimal::ZERO || request.end_price <= Decimal::ZERO {
        return Err(Error::invalid("range prices must be greater than 0"));
    }
    if request.stop_price <= Decimal::ZERO || request.take_profit_price <= Decimal::ZERO {
        return Err(Error::invalid("stop and take-profit prices must be greater than 0"));
    }

    let prices = range_levels(
        request.start_price,
        request.end_price,
        request.num_orders,
        market,
    )?;
    let per_order_risk = request.risk_percentage / Decimal::from(request.num_orders);

    let mut levels = Vec::with_capacity(prices.len());
    for price in prices {
        ensure_protective_stop(request.side, price, request.stop_price)?;

        let mut level = RiskPlan::compute(
            request.total_capital_to_risk,
            per_order_risk,
            price,
            request.stop_price,
            request.take_profit_price,
        )?;
        level.ensure_ratio_above(request.risk_return_threshold)?;

        level.position_size = market.round_amount(level.position_size);
        if level.position_size <= Decimal::ZERO {
            return Err(Error::invalid(format!(
                "size at {} rounds to zero for amount step {}",
                price, market.amount_step
            )));
        }
        levels.push(level);
    }

    let mut total = Decimal::ZERO;
    let mut notional = Decimal::ZERO;
    for level in &levels {
        total = total
            .checked_add(level.position_size)
            .ok_or_else(|| out_of_range("total size", level.entry_price))?;
        notional = level
            .position_size
            .checked_mul(level.entry_price)
            .and_then(|n| notional.checked_add(n))
            .ok_or_else(|| out_of_range("notional", level.entry_price))?;
    }
    let average_entry = notional
        .checked_div(total)
        .ok_or_else(|| out_of_range("average entry", request.start_price))?;
    let aggregate_ratio =
        calculate_risk_return_ratio(average_entry, request.stop_price, request.take_profit_price)?;
    ensure_ratio_above(average_entry, aggregate_ratio, request.risk_return_threshold)?;

    let (stop_quantity, stop_price) = round_stop(market, total, request.stop_price);

    Ok(RangePlan {
        levels,
        stop_side: request.side.opposite(),
        stop_quantity,
        stop_price,
        average_entry,
        aggregate_ratio,
    })
}

pub struct RangeOrderPlanner {
    gateway: Arc<dyn VenueGateway>,
    stops: StopOrderController,
}

impl RangeOrderPlanner {
    pub fn new(gateway: Arc<dyn VenueGateway>, stops: StopOrderController) -> Self {
        Self { gateway, stops }
    }

    pub async fn submit(&self, request: &RangeOrderRequest) -> Result<RangeOrderResult> {
        let symbol = request.symbol.as_str();
        let market = self.gateway.fetch_market(symbol).await?;
        let plan = plan_range(request, &market)?;
        let total = plan.levels.len() + 1;

        info!(
            "Range {} {} x{} over {}..{}, stop {} {} @ {}",
            symbol,
            request.side,
            plan.levels.len(),
            request.start_price,
            request.end_price,
            plan.stop_side,
            plan.stop_quantity,
            plan.stop_price
        );

        let mut entries = Vec::with_capacity(plan.levels.len());
        for level in &plan.levels {
            let placed = self
                .gateway
                .create_limit_order(
                    symbol,
                    request.side,
                    level.position_size,
                    level.entry_price,
                    &OrderParams::new(),
                )
                .await;

            match placed {
                Ok(order) => entries.push(PlacedEntry {
                    price: level.entry_price,
                    quantity: level.position_size,
                    order,
                }),
                Err(source) => {
                    warn!(
                        "Range {} interrupted after {} of {} orders: {}",
                        symbol,
                        entries.len(),
                        total,
                        source
                    );
                    return Err(Error::BatchInterrupted {
                        submitted: entries.len(),
                        total,
                        source,
                    });
                }
            }
        }

        let stop = match self
            .stops
            .place_stop(symbol, plan.stop_side, plan.stop_quantity, plan.stop_price)
            .await
        {
            Ok(stop) => stop,
            Err(Error::Gateway(source)) => {
                warn!("Range {} entries resting without a stop: {}", symbol, source);
                return Err(Error::BatchInterrupted {
                    submitted: entries.len(),
                    total,
                    source,
                });
            }
            Err(other) => return Err(other),
        };

        Ok(RangeOrderResult { entries, stop })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tame_core::OrderType;
    use tame_gateway::{GatewayCall, GatewayOp, PaperGateway, VenueCapabilityTable};
    use tame_ports::GatewayError;

    const ETH: &str = "ETH/USD";

    fn market() -> Market {
        Market::new(ETH, dec!(0.01), dec!(0.001))
    }

    fn request(take_profit: Decimal, threshold: Decimal) -> RangeOrderRequest {
        RangeOrderRequest {
            symbol: ETH.to_string(),
            side: Side::Buy,
            start_price: dec!(100),
            end_price: dec!(110),
            num_orders: 3,
            total_capital_to_risk: dec!(10000),
            risk_percentage: dec!(3),
            stop_price: dec!(90),
            take_profit_price: take_profit,
            risk_return_threshold: threshold,
        }
    }

    fn setup() -> (Arc<PaperGateway>, RangeOrderPlanner) {
        let gateway = Arc::new(
            PaperGateway::emulating(&VenueCapabilityTable::with_defaults(), "paper").unwrap(),
        );
        gateway.add_market(market());
        gateway.set_book(ETH, dec!(120), dec!(121));
        gateway.set_last(ETH, dec!(120.5));
        let stops = StopOrderController::new(gateway.clone(), gateway.profile().clone());
        let planner = RangeOrderPlanner::new(gateway.clone(), stops);
        (gateway, planner)
    }

    #[test]
    fn test_levels_are_evenly_spaced() {
        let levels = range_levels(dec!(100), dec!(110), 3, &market()).unwrap();
        assert_eq!(levels, vec![dec!(100), dec!(105), dec!(110)]);

        let single = range_levels(dec!(100), dec!(110), 1, &market()).unwrap();
        assert_eq!(single, vec![dec!(100)]);

        assert!(range_levels(dec!(100), dec!(110), 0, &market()).is_err());
    }

    #[test]
    fn test_plan_splits_risk_per_level() {
        let plan = plan_range(&request(dec!(150), dec!(1.5)), &market()).unwrap();

        assert_eq!(plan.prices(), vec![dec!(100), dec!(105), dec!(110)]);
        let sizes: Vec<Decimal> = plan.levels.iter().map(|l| l.position_size).collect();
        // 1% of 10000 per level over distances 10, 15, 20; rounded down to 0.001
        assert_eq!(sizes, vec![dec!(10), dec!(6.666), dec!(5)]);
        assert_eq!(plan.stop_quantity, dec!(21.666));
        assert_eq!(plan.stop_side, Side::Sell);
        assert!(plan.aggregate_ratio > dec!(1.5));
    }

    #[test]
    fn test_near_zero_risk_distance_is_rejected() {
        let market = Market::new(ETH, dec!(0.0000000000000000000000000001), dec!(0.001));
        let mut req = request(dec!(1000000), dec!(1));
        req.start_price = dec!(1.0000000000000000000000000001);
        req.end_price = req.start_price;
        req.num_orders = 1;
        req.stop_price = dec!(1);

        let err = plan_range(&req, &market).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_stop_inside_range_rejected() {
        let mut req = request(dec!(150), dec!(1));
        req.stop_price = dec!(105);
        let err = plan_range(&req, &market()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_submits_ladder_then_stop() {
        let (gateway, planner) = setup();

        let result = planner.submit(&request(dec!(150), dec!(1.5))).await.unwrap();

        assert_eq!(result.entries.len(), 3);
        assert!(result.entries.iter().all(|e| e.order.is_some()));
        assert_eq!(result.stop.order_type, OrderType::Stop);
        assert_eq!(result.stop.quantity, dec!(21.666));
        assert_eq!(result.stop.trigger_price, Some(dec!(90)));

        let calls = gateway.calls();
        assert_eq!(calls.len(), 4);
        assert!(matches!(
            &calls[0],
            GatewayCall::CreateLimitOrder { price, .. } if *price == dec!(100)
        ));
        assert!(matches!(&calls[3], GatewayCall::CreateOrder { side: Side::Sell, .. }));
    }

    #[tokio::test]
    async fn test_threshold_violation_submits_nothing() {
        let (gateway, planner) = setup();

        // The 110 level risks 20 to make 20: ratio 1
        let err = planner.submit(&request(dec!(130), dec!(1))).await.unwrap_err();

        match err {
            Error::RiskRewardBelowThreshold { entry_price, .. } => {
                assert_eq!(entry_price, dec!(110))
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(gateway.create_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_failure_reports_interrupted_batch() {
        let (gateway, planner) = setup();
        gateway.fail_next(GatewayOp::CreateOrder, GatewayError::Rejected("margin".into()));

        let err = planner.submit(&request(dec!(150), dec!(1.5))).await.unwrap_err();

        match err {
            Error::BatchInterrupted {
                submitted, total, ..
            } => {
                assert_eq!(submitted, 3);
                assert_eq!(total, 4);
            }
            other => panic!("unexpected {:?}", other),
        }
        // Nothing is rolled back
        assert_eq!(gateway.resting_orders(ETH).len(), 3);
    }

    #[tokio::test]
    async fn test_first_entry_failure_submits_nothing_else() {
        let (gateway, planner) = setup();
        gateway.fail_next(GatewayOp::CreateLimitOrder, GatewayError::Network("reset".into()));

        let err = planner.submit(&request(dec!(150), dec!(1.5))).await.unwrap_err();

        assert!(matches!(err, Error::BatchInterrupted { submitted: 0, .. }));
        assert!(gateway.resting_orders(ETH).is_empty());
    }
}
