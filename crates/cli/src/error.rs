//! Error types for CLI operations.

use agent::AgentError;
use contracts::ContractError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    Config(#[from] ContractError),

    /// The agent failed to start or crashed
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Generic error wrapper
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// 2 for configuration problems, 1 for anything else
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Agent(e) => e.exit_code(),
            Self::Other(_) => 1,
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
