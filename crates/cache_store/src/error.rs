//! Cache store error types

use contracts::ContractError;

/// Errors produced by [`CacheStore`](crate::CacheStore) operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Underlying SQLite failure
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File-system failure (creating the database directory)
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection mutex poisoned by a panicked thread
    #[error("cache store lock poisoned")]
    LockPoisoned,

    /// Stored row does not match the expected layout
    #[error("corrupt cache entry {id}: {message}")]
    Corrupt { id: i64, message: String },

    /// Timestamp outside the range of nanosecond storage (1677..2262)
    #[error("timestamp out of storable range: {0}")]
    TimestampRange(chrono::DateTime<chrono::Utc>),
}

impl From<CacheError> for ContractError {
    fn from(err: CacheError) -> Self {
        ContractError::cache(err.to_string())
    }
}

/// Convenience alias used throughout this crate
pub type Result<T> = std::result::Result<T, CacheError>;
