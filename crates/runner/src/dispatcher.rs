//! Command dispatcher
//!
//! Executes parsed commands against the order engine for the selected
//! market. Every command answers with a single line naming the command; a
//! failure never ends the session, and a lost stop is flagged loudly.

use crate::commands::{Command, HELP};
use crate::error::{Result, RunnerError};
use log::error;
use tame_core::{OrderHandle, OrderType, PositionSide};
use tame_order_manager::{
    BracketOrderRequest, ChaseState, Error, OrderEngine, RangeOrderRequest, StopSpec,
};

/// What the input loop should do with a line's result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Silent,
    Line(String),
    Quit,
}

pub struct Dispatcher {
    engine: OrderEngine,
    symbol: Option<String>,
}

impl Dispatcher {
    pub fn new(engine: OrderEngine) -> Self {
        Self {
            engine,
            symbol: None,
        }
    }

    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    pub fn engine(&self) -> &OrderEngine {
        &self.engine
    }

    pub async fn handle_line(&mut self, line: &str) -> Reply {
        let command = match Command::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Reply::Silent,
            Err(e) => return Reply::Line(format!("error: {}", e)),
        };
        if command == Command::Quit {
            return Reply::Quit;
        }

        let name = command.name();
        match self.execute(command).await {
            Ok(message) => Reply::Line(format!("{}: {}", name, message)),
            Err(e) => Reply::Line(failure_line(name, &e)),
        }
    }

    pub async fn execute(&mut self, command: Command) -> Result<String> {
        match command {
            Command::Market { symbol } => {
                let market = self.engine.market(&symbol).await?;
                self.symbol = Some(market.symbol.clone());
                Ok(format!(
                    "{} selected on {} (tick {}, step {})",
                    market.symbol,
                    self.engine.venue_id(),
                    market.price_tick,
                    market.amount_step
                ))
            }
            Command::Chase {
                side,
                quantity,
                decay,
            } => {
                let symbol = self.selected()?;
                let ticket = self.engine.chase(&symbol, side, quantity, decay).await?;
                let status = self.engine.chase_status().await;
                let placed = match status {
                    Some(s) if s.state == ChaseState::Filled => "filled on arrival".to_string(),
                    Some(s) => format!(
                        "{} @ {}",
                        s.order_id.unwrap_or_default(),
                        s.price.unwrap_or_default()
                    ),
                    None => "placed".to_string(),
                };
                Ok(format!(
                    "session {} {} {} {} ({})",
                    ticket.session_id, side, quantity, symbol, placed
                ))
            }
            Command::CancelChase => match self.engine.active_chase().await {
                None => Ok("no active chase".to_string()),
                Some(session_id) => {
                    let state = self.engine.cancel_chase(session_id).await?;
                    Ok(format!("session {} {}", session_id, state_name(state)))
                }
            },
            Command::Stop {
                price,
                quantity,
                side,
            } => {
                let mut spec = StopSpec::new(self.selected()?, price);
                spec.quantity = quantity;
                spec.side = side;
                let handle = self.engine.create_stop(&spec).await?;
                Ok(describe(&handle))
            }
            Command::UpdateStop { quantity, price } => {
                let symbol = self.selected()?;
                let handle = self.engine.update_stop(&symbol, quantity, price).await?;
                Ok(format!("now {}", describe(&handle)))
            }
            Command::MoveStop { price } => {
                let symbol = self.selected()?;
                let handle = self.engine.edit_stop_trigger(&symbol, price).await?;
                Ok(format!("now {}", describe(&handle)))
            }
            Command::Range {
                side,
                start,
                end,
                num_orders,
                capital,
                risk_pct,
                stop,
                take_profit,
                threshold,
            } => {
                let request = RangeOrderRequest {
                    symbol: self.selected()?,
                    side,
                    start_price: start,
                    end_price: end,
                    num_orders,
                    total_capital_to_risk: capital,
                    risk_percentage: risk_pct,
                    stop_price: stop,
                    take_profit_price: take_profit,
                    risk_return_threshold: threshold
                        .unwrap_or_else(|| self.engine.default_risk_return_threshold()),
                };
                let result = self.engine.submit_range_orders(&request).await?;
                let total: rust_decimal::Decimal =
                    result.entries.iter().map(|e| e.quantity).sum();
                Ok(format!(
                    "{} {} orders for {} between {} and {}; stop {}",
                    result.entries.len(),
                    side,
                    total,
                    start,
                    end,
                    describe(&result.stop)
                ))
            }
            Command::Bracket {
                side,
                entry,
                stop,
                take_profit,
                capital,
                risk_pct,
                threshold,
            } => {
                let request = BracketOrderRequest {
                    symbol: self.selected()?,
                    side,
                    entry_price: entry,
                    stop_price: stop,
                    take_profit_price: take_profit,
                    total_capital_to_risk: capital,
                    risk_percentage: risk_pct,
                    risk_return_threshold: threshold
                        .unwrap_or_else(|| self.engine.default_risk_return_threshold()),
                };
                let result = self.engine.create_bracket_order(&request).await?;
                let entry = match &result.entry {
                    Some(handle) => describe(handle),
                    None => format!("{} {} filled on arrival", side, result.quantity),
                };
                Ok(format!("entry {}; stop {}", entry, describe(&result.stop)))
            }
            Command::Cancel {
                direction,
                from,
                to,
            } => {
                let symbol = self.selected()?;
                let report = self
                    .engine
                    .cancel_orders_by_direction(&symbol, direction, from, to)
                    .await?;
                Ok(format!(
                    "{} orders cancelled from the {} ({} already gone)",
                    report.cancelled.len(),
                    direction,
                    report.already_gone.len()
                ))
            }
            Command::Bump { delta } => {
                let symbol = self.selected()?;
                let report = self.engine.bump_orders(&symbol, delta).await?;
                Ok(format!(
                    "{} orders moved by {}, {} skipped",
                    report.bumped.len(),
                    delta,
                    report.skipped.len()
                ))
            }
            Command::Status => self.status().await,
            Command::Help => Ok(HELP.to_string()),
            Command::Quit => Ok("bye".to_string()),
        }
    }

    async fn status(&self) -> Result<String> {
        let symbol = self.selected()?;
        let position = self.engine.position(&symbol).await?;
        let position = match position.side {
            PositionSide::Flat => "flat".to_string(),
            side => format!(
                "{:?} {} @ {}",
                side,
                position.size,
                position.entry_price.round_dp(2)
            )
            .to_lowercase(),
        };

        let stop = match self.engine.current_stop(&symbol).await {
            Ok(order) => format!(
                "{} {} {} @ {}",
                order.id,
                order.side,
                order.remaining,
                order.trigger_price.unwrap_or_default()
            ),
            Err(Error::NoStopOrder(_)) => "none".to_string(),
            Err(Error::MultipleStopOrders { count, .. }) => format!("{} stops", count),
            Err(e) => return Err(e.into()),
        };

        let chase = match self.engine.chase_status().await {
            Some(s) => format!(
                "{} {} {} ({} reprices)",
                state_name(s.state),
                s.side,
                s.total_quantity,
                s.reprice_count
            ),
            None => "idle".to_string(),
        };

        Ok(format!(
            "{} position {}; stop {}; chase {}",
            symbol, position, stop, chase
        ))
    }

    fn selected(&self) -> Result<String> {
        self.symbol.clone().ok_or(RunnerError::NoMarketSelected)
    }
}

/// Single-line failure, prominent when the position lost its stop
pub fn failure_line(command: &str, err: &RunnerError) -> String {
    if err.is_critical() {
        error!("{}: {}", command, err);
        format!("!!! {} FAILED: {} !!!", command, err)
    } else {
        format!("{} failed: {}", command, err)
    }
}

fn describe(handle: &OrderHandle) -> String {
    let price = match handle.order_type {
        OrderType::Stop => handle.trigger_price,
        _ => handle.price,
    };
    format!(
        "{} {} {} {} @ {}",
        handle.id,
        handle.side,
        handle.quantity,
        handle.order_type.as_str(),
        price.map(|p| p.to_string()).unwrap_or_else(|| "market".to_string())
    )
}

fn state_name(state: ChaseState) -> &'static str {
    match state {
        ChaseState::Placing => "placing",
        ChaseState::Tracking => "tracking",
        ChaseState::Filled => "filled",
        ChaseState::Cancelled => "cancelled",
        ChaseState::Decayed => "decayed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tame_core::Side;
    use tame_gateway::GatewayError;

    #[test]
    fn test_failure_line_flags_lost_protection() {
        let lost = RunnerError::Engine(Error::ProtectionLost {
            symbol: "BTC/USD".to_string(),
            cancelled_order_id: "7".to_string(),
            source: GatewayError::Network("timeout".to_string()),
        });
        let line = failure_line("update-stop", &lost);
        assert!(line.starts_with("!!! update-stop FAILED"));
        assert!(line.contains("PROTECTION LOST"));

        let plain = failure_line("stop", &RunnerError::NoMarketSelected);
        assert_eq!(
            plain,
            "stop failed: no market selected (use 'market <symbol>')"
        );
    }

    #[test]
    fn test_describe_uses_trigger_for_stops() {
        let stop = OrderHandle {
            id: "3".to_string(),
            symbol: "BTC/USD".to_string(),
            side: Side::Sell,
            order_type: OrderType::Stop,
            quantity: dec!(2),
            price: None,
            trigger_price: Some(dec!(28000)),
        };
        assert_eq!(describe(&stop), "3 sell 2 stop @ 28000");
    }
}
