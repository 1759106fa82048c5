//! Error types for the gateway crate

use thiserror::Error;

/// Capability registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("No capability profile registered for venue '{0}'")]
    UnknownVenueCapability(String),
}
