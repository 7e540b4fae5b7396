//! # Cache Error Types
//!
//! Cache failures never decide the outcome of a request. Callers log them
//! at `warn!` and fall back to the database.

use thiserror::Error;

/// Cache operation errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Could not reach the cache backend.
    #[error("Cache connection failed: {0}")]
    ConnectionFailed(String),

    /// The backend rejected or failed a command.
    #[error("Cache command failed: {0}")]
    Backend(String),

    /// A cached payload could not be encoded or decoded.
    #[error("Cache payload invalid: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A counter key held something other than an integer.
    #[error("Cache key {key} does not hold a counter")]
    NotACounter { key: String },

    /// The in-process store's lock was poisoned by a panicking writer.
    #[error("Cache lock poisoned")]
    Poisoned,
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
            CacheError::ConnectionFailed(err.to_string())
        } else {
            CacheError::Backend(err.to_string())
        }
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
