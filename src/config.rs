//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::time::Duration;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Redis connection URL; None disables caching entirely
    pub redis_url: Option<String>,
    /// Default key expiration time in seconds
    pub ttl_seconds: u64,
    /// Approximate maximum number of entries per namespace
    pub capacity: u64,
    /// Prefix for all keys written by the cache
    pub key_prefix: String,
    /// Redis connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Redis response timeout in milliseconds
    pub response_timeout_ms: u64,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REDIS_URL` - Redis connection URL (default: unset, caching disabled)
    /// - `CACHE_TTL` - Key expiration in seconds (default: 86400)
    /// - `CACHE_CAPACITY` - Approximate entries per namespace (default: 5000)
    /// - `CACHE_PREFIX` - Key prefix (default: "lru")
    /// - `CACHE_CONNECT_TIMEOUT_MS` - Connect timeout (default: 500)
    /// - `CACHE_RESPONSE_TIMEOUT_MS` - Response timeout (default: 500)
    pub fn from_env() -> Self {
        Self {
            redis_url: env::var("REDIS_URL").ok(),
            ttl_seconds: env::var("CACHE_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(86_400),
            capacity: env::var("CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
            key_prefix: env::var("CACHE_PREFIX").unwrap_or_else(|_| "lru".to_string()),
            connect_timeout_ms: env::var("CACHE_CONNECT_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            response_timeout_ms: env::var("CACHE_RESPONSE_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
        }
    }

    /// Default key expiration as a Duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Connect timeout as a Duration. Kept sub-second by default so an
    /// unreachable store degrades to the fail-open path promptly.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Response timeout as a Duration.
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl_seconds: 86_400,
            capacity: 5000,
            key_prefix: "lru".to_string(),
            connect_timeout_ms: 500,
            response_timeout_ms: 500,
        }
    }
}
