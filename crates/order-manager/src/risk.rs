//! Risk Math
//!
//! Position sizing from a risk budget and the risk/return check shared by
//! the range and bracket planners. Everything here is pure; nothing is
//! persisted.

use crate::error::{Error, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tame_core::Side;

/// Size such that hitting the stop loses `capital × risk_pct / 100`
pub fn calculate_position_size(
    capital: Decimal,
    risk_pct: Decimal,
    entry_price: Decimal,
    stop_price: Decimal,
) -> Result<Decimal> {
    let distance = risk_distance(entry_price, stop_price)?;
    capital
        .checked_mul(risk_pct)
        .and_then(|budget| budget.checked_div(dec!(100)))
        .and_then(|budget| budget.checked_div(distance))
        .ok_or_else(|| out_of_range("position size", entry_price))
}

/// Reward distance over risk distance
pub fn calculate_risk_return_ratio(
    entry_price: Decimal,
    stop_price: Decimal,
    take_profit_price: Decimal,
) -> Result<Decimal> {
    let risk = risk_distance(entry_price, stop_price)?;
    take_profit_price
        .checked_sub(entry_price)
        .and_then(|reward| reward.abs().checked_div(risk))
        .ok_or_else(|| out_of_range("risk/return ratio", entry_price))
}

fn risk_distance(entry_price: Decimal, stop_price: Decimal) -> Result<Decimal> {
    let distance = entry_price
        .checked_sub(stop_price)
        .ok_or_else(|| out_of_range("risk distance", entry_price))?
        .abs();
    if distance.is_zero() {
        return Err(Error::ZeroRiskDistance(entry_price));
    }
    Ok(distance)
}

/// Decimal overflow from user-supplied prices or budgets
pub(crate) fn out_of_range(what: &str, entry_price: Decimal) -> Error {
    Error::invalid(format!(
        "{} at entry {} is out of the representable range",
        what, entry_price
    ))
}

/// One priced entry with its risk budget
#[derive(Debug, Clone, PartialEq)]
pub struct RiskPlan {
    pub total_capital_to_risk: Decimal,
    pub risk_percentage: Decimal,
    pub entry_price: Decimal,
    pub stop_price: Decimal,
    pub take_profit_price: Decimal,
    pub position_size: Decimal,
    pub risk_return_ratio: Decimal,
}

impl RiskPlan {
    pub fn compute(
        total_capital_to_risk: Decimal,
        risk_percentage: Decimal,
        entry_price: Decimal,
        stop_price: Decimal,
        take_profit_price: Decimal,
    ) -> Result<Self> {
        let position_size =
            calculate_position_size(total_capital_to_risk, risk_percentage, entry_price, stop_price)?;
        let risk_return_ratio =
            calculate_risk_return_ratio(entry_price, stop_price, take_profit_price)?;

        Ok(Self {
            total_capital_to_risk,
            risk_percentage,
            entry_price,
            stop_price,
            take_profit_price,
            position_size,
            risk_return_ratio,
        })
    }

    /// Reject (never clamp) a ratio at or below `threshold`
    pub fn ensure_ratio_above(&self, threshold: Decimal) -> Result<()> {
        ensure_ratio_above(self.entry_price, self.risk_return_ratio, threshold)
    }
}

pub(crate) fn ensure_ratio_above(entry_price: Decimal, ratio: Decimal, threshold: Decimal) -> Result<()> {
    if ratio <= threshold {
        return Err(Error::RiskRewardBelowThreshold {
            entry_price,
            ratio,
            threshold,
        });
    }
    Ok(())
}

/// Capital, risk percentage and threshold shared by every planner
pub(crate) fn validate_budget(capital: Decimal, risk_pct: Decimal, threshold: Decimal) -> Result<()> {
    if capital <= Decimal::ZERO {
        return Err(Error::invalid("capital to risk must be greater than 0"));
    }
    if risk_pct <= Decimal::ZERO || risk_pct > dec!(100) {
        return Err(Error::invalid("risk percentage must be in (0, 100]"));
    }
    if threshold < Decimal::ZERO {
        return Err(Error::invalid("risk/return threshold must not be negative"));
    }
    Ok(())
}

/// The stop must sit on the losing side of the entry
pub(crate) fn ensure_protective_stop(side: Side, entry_price: Decimal, stop_price: Decimal) -> Result<()> {
    let protective = match side {
        Side::Buy => stop_price < entry_price,
        Side::Sell => stop_price > entry_price,
    };
    if !protective {
        return Err(Error::invalid(format!(
            "stop {} is not below/above the {} entry at {}",
            stop_price, side, entry_price
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_size() {
        let size = calculate_position_size(dec!(10000), dec!(2), dec!(100), dec!(90)).unwrap();
        assert_eq!(size, dec!(20));

        // Short side: stop above entry
        let size = calculate_position_size(dec!(10000), dec!(2), dec!(90), dec!(100)).unwrap();
        assert_eq!(size, dec!(20));
    }

    #[test]
    fn test_risk_return_ratio() {
        let ratio = calculate_risk_return_ratio(dec!(100), dec!(90), dec!(130)).unwrap();
        assert_eq!(ratio, dec!(3));
    }

    #[test]
    fn test_zero_distance() {
        assert!(matches!(
            calculate_position_size(dec!(10000), dec!(2), dec!(100), dec!(100)),
            Err(Error::ZeroRiskDistance(_))
        ));
        assert!(matches!(
            calculate_risk_return_ratio(dec!(100), dec!(100), dec!(130)),
            Err(Error::ZeroRiskDistance(_))
        ));
    }

    #[test]
    fn test_tiny_risk_distance_is_an_input_error() {
        let entry = dec!(1.0000000000000000000000000001);
        let err = calculate_risk_return_ratio(entry, dec!(1), dec!(1000000)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = calculate_position_size(Decimal::MAX, dec!(100), entry, dec!(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(RiskPlan::compute(dec!(10000), dec!(2), entry, dec!(1), dec!(1000000)).is_err());
    }

    #[test]
    fn test_threshold_is_strict() {
        let plan = RiskPlan::compute(dec!(10000), dec!(2), dec!(100), dec!(90), dec!(120)).unwrap();
        assert_eq!(plan.position_size, dec!(20));
        assert_eq!(plan.risk_return_ratio, dec!(2));

        assert!(plan.ensure_ratio_above(dec!(1.5)).is_ok());
        assert!(matches!(
            plan.ensure_ratio_above(dec!(2)),
            Err(Error::RiskRewardBelowThreshold { .. })
        ));
    }

    #[test]
    fn test_protective_stop_side() {
        assert!(ensure_protective_stop(Side::Buy, dec!(100), dec!(90)).is_ok());
        assert!(ensure_protective_stop(Side::Buy, dec!(100), dec!(110)).is_err());
        assert!(ensure_protective_stop(Side::Sell, dec!(100), dec!(110)).is_ok());
        assert!(ensure_protective_stop(Side::Sell, dec!(100), dec!(100)).is_err());
    }

    #[test]
    fn test_budget_validation() {
        assert!(validate_budget(dec!(1000), dec!(1), dec!(1)).is_ok());
        assert!(validate_budget(dec!(0), dec!(1), dec!(1)).is_err());
        assert!(validate_budget(dec!(1000), dec!(101), dec!(1)).is_err());
        assert!(validate_budget(dec!(1000), dec!(1), dec!(-1)).is_err());
    }
}
