//! memocache - A Redis-backed memoizing cache
//!
//! Persists the results of expensive function calls in a shared key-value
//! store with tag-scoped invalidation, approximate LRU eviction per
//! namespace, and fail-open behavior when the store is unreachable.

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod memo;
pub mod metrics;

pub use backend::{MemoryBackend, RedisBackend, StoreBackend};
pub use cache::{ArgSlice, CallArgs, FnCache, KeyBuilder, TagSpec};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use memo::{Computation, FnComputation, MemoOptions, Memoized};
pub use metrics::{MemoryMetrics, MetricsSink, NoopMetrics};
