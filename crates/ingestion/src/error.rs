//! Ingestion error types

use thiserror::Error;

/// Errors raised while turning raw bytes into frames
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Image bytes could not be decoded
    #[error("failed to decode image from {origin}: {message}")]
    Decode {
        /// File name or stream position
        origin: String,
        message: String,
    },

    /// Underlying read failed
    #[error("io error on {origin}: {source}")]
    Io {
        origin: String,
        #[source]
        source: std::io::Error,
    },
}

impl IngestionError {
    pub fn decode(origin: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            origin: origin.into(),
            message: message.to_string(),
        }
    }

    pub fn io(origin: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            origin: origin.into(),
            source,
        }
    }
}

/// Ingestion Result alias
pub type Result<T> = std::result::Result<T, IngestionError>;
