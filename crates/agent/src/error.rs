//! Agent error types

use contracts::ContractError;
use reporter::ReporterError;
use thiserror::Error;

use crate::state::AgentState;

/// Errors that end a run before or outside the normal drain path
#[derive(Debug, Error)]
pub enum AgentError {
    /// Startup could not complete: source open, engine creation or warm-up
    #[error("startup failed: {0}")]
    Startup(#[source] ContractError),

    /// Reporter could not be created or failed at runtime
    #[error("reporter failed: {0}")]
    Reporter(#[from] ReporterError),

    /// The capture thread panicked or was cancelled
    #[error("capture task failed: {0}")]
    CaptureTask(String),

    #[error("invalid state transition {from} -> {to}")]
    InvalidTransition { from: AgentState, to: AgentState },
}

impl AgentError {
    /// Whether this is a configuration problem rather than a runtime fault
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Startup(e) => e.is_configuration() || matches!(e, ContractError::Inference { .. }),
            Self::Reporter(ReporterError::TransportCreation { .. }) => true,
            _ => false,
        }
    }

    /// Process exit code: 2 for configuration problems, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.is_configuration() {
            2
        } else {
            1
        }
    }
}
