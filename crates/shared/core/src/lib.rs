//! Tame Core Domain
//!
//! Pure domain types for the tame trading client.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    // Account state
    Balance,
    // Market data
    BookLevel,
    // Instruments
    Market,
    // Orders
    OpenOrder,
    OrderBook,
    OrderHandle,
    OrderId,
    OrderType,
    // Positions
    Position,
    PositionSide,
    Side,
    Ticker,
};
pub use entities::base_currency;
pub use values::{Price, Quantity, Symbol, Timestamp};
