//! Error types for the memoizing cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the memoizing cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Invalid cache or tag configuration. Raised before any store access;
    /// this is a programmer error, not a runtime condition to recover from.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The Redis backend reported a connectivity or protocol error.
    #[error("Store error: {0}")]
    Store(#[from] redis::RedisError),

    /// The backend could not be reached at all.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A value failed to encode or decode. Values that cannot round-trip
    /// must not be cached, so this propagates to the caller.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CacheError {
    // == Store Classification ==
    /// True for the connectivity class of errors.
    ///
    /// The memoizing wrapper fails open on these and only these: configuration
    /// and serialization errors always surface to the caller.
    pub fn is_store(&self) -> bool {
        matches!(self, CacheError::Store(_) | CacheError::Unavailable(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the memoizing cache.
pub type Result<T> = std::result::Result<T, CacheError>;
