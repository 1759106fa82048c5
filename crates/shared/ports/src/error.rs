use thiserror::Error;

/// Failures reported by the venue gateway
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Operation not supported by venue: {0}")]
    NotSupported(String),

    #[error("Unknown market: {0}")]
    UnknownMarket(String),

    #[error("Order rejected: {0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Exchange error: {0}")]
    Exchange(String),
}

impl GatewayError {
    /// Cancel paths treat a missing order as already gone
    pub fn is_order_not_found(&self) -> bool {
        matches!(self, GatewayError::OrderNotFound(_))
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, GatewayError::NotSupported(_))
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
