//! Tame Ports
//!
//! Port definitions (traits) for the tame trading client.
//! These define the boundary between the order lifecycle engine and the
//! venue gateway that owns connectivity, signing and normalization.

mod error;
mod gateway;
mod params;

pub use error::{GatewayError, GatewayResult};
pub use gateway::VenueGateway;
pub use params::OrderParams;
