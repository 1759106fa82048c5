//! Runner errors

use tame_gateway::CapabilityError;
use tame_order_manager::ConfigError;
use thiserror::Error;

/// Line could not be turned into a command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}' (try 'help')")]
    UnknownCommand(String),

    #[error("{command}: missing <{argument}>")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("{command}: invalid <{argument}> '{value}'")]
    InvalidArgument {
        command: &'static str,
        argument: &'static str,
        value: String,
    },

    #[error("{0}: too many arguments")]
    TooManyArguments(&'static str),
}

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Engine(#[from] tame_order_manager::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no market selected (use 'market <symbol>')")]
    NoMarketSelected,
}

impl RunnerError {
    /// Protection was lost and the user must act
    pub fn is_critical(&self) -> bool {
        matches!(self, RunnerError::Engine(e) if e.is_critical())
    }
}

pub type Result<T> = std::result::Result<T, RunnerError>;
