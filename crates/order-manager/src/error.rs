//! Order Manager errors

use rust_decimal::Decimal;
use tame_core::Side;
use tame_gateway::CapabilityError;
use tame_ports::GatewayError;
use thiserror::Error;
use uuid::Uuid;

/// Failure classes reported to the command dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad quantity, price or threshold; nothing was attempted
    UserInput,
    /// Conflicting engine or venue state; nothing was attempted
    StateConflict,
    /// Missing stop order or position
    NotFound,
    /// Network failure or venue rejection
    Gateway,
    /// A stop was cancelled but its replacement was not placed
    ProtectionLost,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error("A chase is already active for {symbol} (session {session_id})")]
    ChaseAlreadyActive { symbol: String, session_id: Uuid },

    #[error("Unknown chase session: {0}")]
    UnknownChaseSession(Uuid),

    #[error("Found {count} stop orders for {symbol}; refusing to pick one")]
    MultipleStopOrders { symbol: String, count: usize },

    #[error("No stop order found for {0}")]
    NoStopOrder(String),

    #[error("Nothing to protect on {0}: no position and no resting orders")]
    NoQuantityToProtect(String),

    #[error("Cannot infer stop side for {symbol}: {reason}")]
    AmbiguousStopSide { symbol: String, reason: String },

    #[error("Entry price equals stop price ({0}); risk distance is zero")]
    ZeroRiskDistance(Decimal),

    #[error(
        "Risk/return ratio {ratio} at entry {entry_price} does not exceed threshold {threshold}"
    )]
    RiskRewardBelowThreshold {
        entry_price: Decimal,
        ratio: Decimal,
        threshold: Decimal,
    },

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Batch interrupted after {submitted} of {total} orders: {source}")]
    BatchInterrupted {
        submitted: usize,
        total: usize,
        #[source]
        source: GatewayError,
    },

    #[error(
        "Order {cancelled_order_id} on {symbol} was cancelled for a bump but its replacement ({side} {quantity} @ {price}) failed after {bumped} orders were bumped: {source}"
    )]
    ReplacementLost {
        symbol: String,
        cancelled_order_id: String,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        bumped: usize,
        #[source]
        source: GatewayError,
    },

    #[error(
        "PROTECTION LOST on {symbol}: stop {cancelled_order_id} was cancelled but its replacement failed: {source}"
    )]
    ProtectionLost {
        symbol: String,
        cancelled_order_id: String,
        #[source]
        source: GatewayError,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_)
            | Error::ZeroRiskDistance(_)
            | Error::RiskRewardBelowThreshold { .. } => ErrorKind::UserInput,
            Error::Capability(_)
            | Error::ChaseAlreadyActive { .. }
            | Error::MultipleStopOrders { .. }
            | Error::AmbiguousStopSide { .. } => ErrorKind::StateConflict,
            Error::UnknownChaseSession(_)
            | Error::NoStopOrder(_)
            | Error::NoQuantityToProtect(_) => ErrorKind::NotFound,
            Error::Gateway(_)
            | Error::BatchInterrupted { .. }
            | Error::ReplacementLost { .. } => ErrorKind::Gateway,
            Error::ProtectionLost { .. } => ErrorKind::ProtectionLost,
        }
    }

    /// The position is now unprotected and the user must be alerted
    pub fn is_critical(&self) -> bool {
        self.kind() == ErrorKind::ProtectionLost
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            Error::MultipleStopOrders {
                symbol: "BTC/USD".into(),
                count: 2
            }
            .kind(),
            ErrorKind::StateConflict
        );
        assert_eq!(Error::NoStopOrder("BTC/USD".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            Error::from(GatewayError::Network("reset".into())).kind(),
            ErrorKind::Gateway
        );

        let lost = Error::ProtectionLost {
            symbol: "BTC/USD".into(),
            cancelled_order_id: "42".into(),
            source: GatewayError::Rejected("margin".into()),
        };
        assert!(lost.is_critical());
        assert!(lost.to_string().starts_with("PROTECTION LOST"));
    }
}
