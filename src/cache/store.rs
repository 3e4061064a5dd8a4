//! Function Cache
//!
//! Cache engine over a store backend: per-namespace hash maps with a recency
//! index, capacity-bounded batch eviction, whole-namespace expiration, and
//! tag-scoped purge.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::backend::{unix_ms, StoreBackend};
use crate::cache::key::{index_key, namespace, purge_pattern};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::metrics::MetricsSink;

// == Eviction Batch ==
/// Maximum number of entries removed in one eviction pass.
pub const MAX_EVICTION_BATCH: u64 = 1000;

/// Entries removed per eviction pass: a tenth of capacity, at least one,
/// at most [`MAX_EVICTION_BATCH`].
pub(crate) fn eviction_batch(capacity: u64) -> u64 {
    (capacity / 10).clamp(1, MAX_EVICTION_BATCH)
}

// == Function Cache ==
/// Cache for function results, partitioned into `prefix:tag:function`
/// namespaces.
///
/// Capacity is approximate: the size check runs before each insert, so a
/// namespace can transiently exceed capacity by one entry between checks.
pub struct FnCache {
    backend: Arc<dyn StoreBackend>,
    metrics: Arc<dyn MetricsSink>,
    ttl: Duration,
    capacity: u64,
    prefix: String,
}

impl FnCache {
    // == Constructor ==
    /// Creates a cache over a backend with injected metrics.
    pub fn new(
        backend: Arc<dyn StoreBackend>,
        metrics: Arc<dyn MetricsSink>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            backend,
            metrics,
            ttl: config.ttl(),
            capacity: config.capacity,
            prefix: config.key_prefix.clone(),
        }
    }

    // == Get ==
    /// Reads a cached value. Returns None on a miss.
    ///
    /// A stored-but-empty value is treated as absent: the contract does not
    /// distinguish "no entry" from "entry present but empty", so a result
    /// whose encoding is the empty string always recomputes. Known
    /// cache-semantics limitation.
    pub async fn get(&self, func_name: &str, key: &str, tag: Option<&str>) -> Result<Option<String>> {
        let ns = namespace(&self.prefix, tag, func_name);
        let value = self.backend.hash_get(&ns, key).await?;
        let value = value.filter(|stored| !stored.is_empty());

        if value.is_some() {
            self.metrics.increment("fncache.hit", &[("function", func_name)]);
            debug!(function = func_name, namespace = %ns, "cache hit");
        } else {
            self.metrics.increment("fncache.miss", &[("function", func_name)]);
            debug!(function = func_name, namespace = %ns, "cache miss");
        }
        Ok(value)
    }

    // == Add ==
    /// Stores a computed value, evicting first when the namespace is at
    /// capacity. The field write, recency-index entry, and expiration
    /// refresh go out as one pipelined batch; every field's effective
    /// lifetime is capped by the most recent write to its namespace.
    pub async fn add(&self, func_name: &str, key: &str, value: &str, tag: Option<&str>) -> Result<()> {
        let ns = namespace(&self.prefix, tag, func_name);
        let idx = index_key(&ns);

        self.eject(func_name, &ns, &idx).await?;

        self.backend
            .hash_put(&ns, &idx, key, value, unix_ms(), self.ttl)
            .await?;
        self.metrics.increment("fncache.add", &[("function", func_name)]);
        debug!(function = func_name, namespace = %ns, "cache add");
        Ok(())
    }

    // == Eject ==
    /// Removes a batch of the oldest entries when the namespace has reached
    /// capacity. Hash fields and index members are removed in the same
    /// atomic batch so the two structures never diverge.
    ///
    /// Addresses one concrete namespace; the purge-style glob is never valid
    /// here because size checks and removals are exact-match operations.
    async fn eject(&self, func_name: &str, ns: &str, idx: &str) -> Result<()> {
        if self.backend.index_len(idx).await? < self.capacity {
            return Ok(());
        }

        let batch = eviction_batch(self.capacity);
        let oldest = self.backend.index_oldest(idx, batch).await?;
        if oldest.is_empty() {
            return Ok(());
        }

        self.backend.remove_entries(ns, idx, &oldest).await?;
        self.metrics.increment("fncache.eject", &[("function", func_name)]);
        info!(
            function = func_name,
            namespace = %ns,
            evicted = oldest.len(),
            "evicted oldest entries"
        );
        Ok(())
    }

    // == Purge ==
    /// Deletes every key under a tag: all functions' namespaces and their
    /// recency indexes, in one atomic batch. Idempotent; returns the number
    /// of keys deleted.
    ///
    /// Store errors surface to the caller here: unlike the memoized read
    /// path there is no correct fallback for an invalidation request.
    pub async fn purge(&self, tag: &str) -> Result<u64> {
        let pattern = purge_pattern(&self.prefix, tag);
        let deleted = self.backend.delete_matching(&pattern).await?;
        self.metrics.increment("fncache.purge", &[("tag", tag)]);
        info!(tag, deleted, "purged tag");
        Ok(deleted)
    }
}
