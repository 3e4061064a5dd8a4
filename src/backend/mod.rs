//! Store Backend Module
//!
//! The protocol seam between cache policy and the key-value store. The cache
//! needs hash-field get/set, a sorted-set recency index, whole-key expiration,
//! pattern-based key enumeration, and batched command submission; anything
//! exposing those operations can sit behind [`StoreBackend`].

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::error::Result;

mod memory;
mod redis;

pub use memory::MemoryBackend;
pub use redis::RedisBackend;

// == Store Backend Trait ==
/// Key-value store operations used by the cache.
///
/// `namespace` always names the per-function hash map and `index` its recency
/// sorted set; both are concrete keys, never patterns. Patterns appear only in
/// [`delete_matching`](StoreBackend::delete_matching), which backs purge.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Reads one hash field. Returns None when the key or field is missing.
    async fn hash_get(&self, namespace: &str, field: &str) -> Result<Option<String>>;

    /// Writes one hash field, records it in the recency index with the given
    /// score, and refreshes the TTL of both keys, in a single pipelined batch.
    ///
    /// The batch minimizes round trips but is not transactional: a crash
    /// between commands can leave the field written without a refreshed TTL.
    async fn hash_put(
        &self,
        namespace: &str,
        index: &str,
        field: &str,
        value: &str,
        score: u64,
        ttl: Duration,
    ) -> Result<()>;

    /// Number of members in the recency index.
    async fn index_len(&self, index: &str) -> Result<u64>;

    /// The `count` oldest members of the recency index, oldest first.
    async fn index_oldest(&self, index: &str, count: u64) -> Result<Vec<String>>;

    /// Removes fields from both the hash map and the recency index in one
    /// atomic batch, keeping the two structures in lockstep.
    async fn remove_entries(&self, namespace: &str, index: &str, fields: &[String]) -> Result<()>;

    /// Deletes every key matching a glob pattern in one atomic batch.
    /// Returns the number of keys deleted; zero matches is a no-op.
    async fn delete_matching(&self, pattern: &str) -> Result<u64>;
}

// == Clock ==
/// Current Unix timestamp in milliseconds. Used for recency scores and for
/// the in-memory backend's expiration bookkeeping.
pub(crate) fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
