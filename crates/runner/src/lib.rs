//! Tame Runner - Interactive Order Console
//!
//! Reads one command per line and drives the order engine:
//!
//! - **Bootstrap**: Config loading and paper venue setup
//! - **Commands**: Line parsing into typed commands
//! - **Dispatcher**: Command execution against the selected market
//!
//! ## Architecture
//!
//! ```text
//!   stdin lines
//!        │
//!        ▼
//! ┌──────────────┐     ┌──────────────┐
//! │   Commands   │────▶│  Dispatcher  │──── one reply line
//! └──────────────┘     └──────┬───────┘
//!                             │
//!                             ▼
//!                  ┌─────────────────────┐
//!                  │    Order Engine     │
//!                  │ chase / stop / risk │
//!                  └──────────┬──────────┘
//!                             │
//!                             ▼
//!                  ┌─────────────────────┐
//!                  │   Venue Gateway     │
//!                  └─────────────────────┘
//! ```

pub mod bootstrap;
pub mod commands;
pub mod dispatcher;
pub mod error;

pub use bootstrap::{capability_table, demo_config, paper_engine, paper_gateway};
pub use commands::{Command, HELP};
pub use dispatcher::{Dispatcher, Reply};
pub use error::{CommandError, Result, RunnerError};
