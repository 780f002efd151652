//! Layered error definitions
//!
//! Categorized by origin: config / source / inference / delivery / cache

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Source Errors =====
    /// Source could not be opened (bad path, missing device, unsupported container)
    #[error("source '{source_id}' open error: {message}")]
    SourceOpen { source_id: String, message: String },

    /// Transient read failure; reconnect-capable sources retry internally
    #[error("source '{source_id}' read error: {message}")]
    SourceRead { source_id: String, message: String },

    /// Source can no longer produce frames
    #[error("source '{source_id}' failed: {message}")]
    SourceFatal { source_id: String, message: String },

    // ===== Inference Errors =====
    /// Per-frame inference failure
    #[error("inference engine '{engine}' error: {message}")]
    Inference { engine: String, message: String },

    // ===== Delivery Errors =====
    /// Report delivery failure
    #[error("delivery to '{endpoint}' failed: {message}")]
    Delivery {
        endpoint: String,
        message: String,
        retryable: bool,
    },

    // ===== Cache Errors =====
    /// Local cache storage failure
    #[error("cache error: {message}")]
    Cache { message: String },

    // ===== General Errors =====
    /// Payload serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create source open error
    pub fn source_open(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceOpen {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Create transient source read error
    pub fn source_read(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceRead {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Create fatal source error
    pub fn source_fatal(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceFatal {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Create inference error
    pub fn inference(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Inference {
            engine: engine.into(),
            message: message.into(),
        }
    }

    /// Create delivery error
    pub fn delivery(
        endpoint: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self::Delivery {
            endpoint: endpoint.into(),
            message: message.into(),
            retryable,
        }
    }

    /// Create cache error
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Errors that must abort startup before the agent starts running.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse { .. } | Self::ConfigValidation { .. } | Self::SourceOpen { .. }
        )
    }

    /// Errors after which a source cannot continue.
    pub fn is_fatal_source(&self) -> bool {
        matches!(self, Self::SourceFatal { .. })
    }

    /// Whether another attempt of the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Delivery { retryable, .. } => *retryable,
            Self::SourceRead { .. } | Self::Io(_) => true,
            _ => false,
        }
    }
}
