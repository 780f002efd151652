//! Reporter error types

use thiserror::Error;

/// Reporter-specific errors
#[derive(Debug, Error)]
pub enum ReporterError {
    /// Transport could not be built from configuration
    #[error("failed to create transport for '{endpoint}': {message}")]
    TransportCreation { endpoint: String, message: String },

    /// The reporter worker is gone; no more results are accepted
    #[error("reporter intake closed")]
    IntakeClosed,

    /// Blocking cache task panicked or was cancelled
    #[error("cache task failed: {0}")]
    CacheTask(String),

    /// Cache store failure
    #[error("cache error: {0}")]
    Cache(#[from] cache_store::CacheError),

    /// Delivery or serialization error (from contract)
    #[error("reporter error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl ReporterError {
    /// Create a transport creation error
    pub fn transport_creation(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransportCreation {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }
}
