mod balance;
mod book;
mod market;
mod order;
mod order_type;
mod position;
mod side;

pub use balance::Balance;
pub use book::{BookLevel, OrderBook, Ticker};
pub use market::{Market, base_currency};
pub use order::{OpenOrder, OrderHandle, OrderId};
pub use order_type::OrderType;
pub use position::{Position, PositionSide};
pub use side::Side;
