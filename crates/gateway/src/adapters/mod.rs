//! Venue adapters
//!
//! Adapters implement the `VenueGateway` port. The paper venue keeps all
//! state in memory and emulates the quirks of a capability profile.

pub mod paper;

pub use paper::PaperGateway;
