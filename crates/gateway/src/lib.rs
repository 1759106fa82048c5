//! Tame Gateway
//!
//! Venue layer for the tame trading client. Provides:
//! - The venue capability registry (per-venue order-type and field quirks)
//! - Venue parameter building for protective stops
//! - Venue adapters (an in-memory paper venue; live venues plug in through
//!   the `VenueGateway` port)
//!
//! ## Architecture
//!
//! ```text
//!   Controllers (stop, chase, planners)
//!         │ lookup(venue_id)
//!    ┌────▼──────────────┐
//!    │ Capability Table  │  stop type name, trigger field, reduce-only ...
//!    └────┬──────────────┘
//!         │ OrderParams
//!    ┌────▼────┐
//!    │ Gateway │  VenueGateway port (paper, live adapters)
//!    └─────────┘
//! ```
//!
//! New venues are onboarded by adding a row to the table, never by
//! branching inside the controllers.

pub mod adapters;
pub mod capabilities;
pub mod error;

// Re-export commonly used types
pub use adapters::paper::{GatewayCall, GatewayOp, PaperGateway};
pub use capabilities::{
    ConfirmationLatency, PositionSource, VenueCapabilityProfile, VenueCapabilityTable,
};
pub use error::CapabilityError;
pub use tame_ports::{GatewayError, GatewayResult, OrderParams, VenueGateway};
