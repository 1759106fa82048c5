//! Tame Order Manager
//!
//! The order lifecycle engine. Venues only offer place, cancel, edit and
//! fetch; this crate builds the synthetic behaviours on top:
//! - **Stops**: protective stops whose side and size are inferred from the
//!   live position and resting orders, replaced by cancel-then-recreate on
//!   venues without in-place edits
//! - **Chase**: a limit order that follows the top of book until it fills,
//!   is cancelled, or decays
//! - **Range / Bracket**: risk-budgeted entries validated up front and
//!   protected by a single stop
//! - **Maintenance**: bulk cancel from the top/bottom of the ladder and bulk
//!   price bumps
//!
//! ## Architecture
//!
//! ```text
//!   Command dispatcher
//!          │
//!   ┌──────▼───────────────────────────────────────────────┐
//!   │                    Order Engine                      │
//!   │  ┌───────────┐ ┌───────────┐ ┌───────────────────┐   │
//!   │  │   Chase   │ │   Stops   │◄┤ Range / Bracket   │   │
//!   │  │ Controller│ │ Controller│ │ Planners          │   │
//!   │  └─────┬─────┘ └─────┬─────┘ └─────────┬─────────┘   │
//!   │        │       ┌─────▼─────┐           │             │
//!   │        │       │ Position  │   ┌───────▼───────┐     │
//!   │        │       │ Reader    │   │ Maintenance   │     │
//!   │        │       └─────┬─────┘   └───────┬───────┘     │
//!   └────────┼─────────────┼─────────────────┼─────────────┘
//!            ▼             ▼                 ▼
//!      VenueGateway  (params shaped by the VenueCapabilityProfile)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tame_order_manager::{EngineConfig, OrderEngine, StopSpec};
//!
//! let engine = OrderEngine::new(gateway, EngineConfig::default())?;
//!
//! // Side and quantity inferred from position and resting orders
//! let stop = engine.create_stop(&StopSpec::new("BTC/USD", dec!(28000))).await?;
//!
//! // Move it later; the returned handle carries the new order id
//! let stop = engine.edit_stop_trigger("BTC/USD", dec!(28500)).await?;
//! ```

pub mod bracket;
pub mod chase;
pub mod config;
pub mod engine;
pub mod error;
pub mod maintenance;
pub mod position;
pub mod range;
pub mod risk;
pub mod stop;

// Re-export main types
pub use bracket::{BracketOrderPlanner, BracketOrderRequest, BracketOrderResult, BracketPlan};
pub use chase::{ChaseOrderController, ChaseState, ChaseStatus, ChaseTicket, TickOutcome};
pub use config::{BracketConfig, ChaseConfig, ConfigError, EngineConfig, MarketConfig, RiskConfig};
pub use engine::OrderEngine;
pub use error::{Error, ErrorKind, Result};
pub use maintenance::{BumpReport, CancelReport, Direction, OrderMaintenance};
pub use position::PositionReader;
pub use range::{PlacedEntry, RangeOrderPlanner, RangeOrderRequest, RangeOrderResult, RangePlan};
pub use risk::{RiskPlan, calculate_position_size, calculate_risk_return_ratio};
pub use stop::{StopOrderController, StopSpec};
