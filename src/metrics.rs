//! Metrics Module
//!
//! Counter emission for cache operations. The sink is an injected
//! collaborator: constructed once at process start and passed into the cache
//! explicitly. Increments are best-effort side effects and must never block
//! or fail a cache operation.

use std::collections::HashMap;
use std::sync::Mutex;

// == Metrics Sink Trait ==
/// Receiver for cache operation counters.
///
/// One increment is emitted per operation: `hit`, `miss`, `add`, `eject`,
/// `purge`. Implementations must be infallible and non-blocking.
pub trait MetricsSink: Send + Sync {
    /// Increments the named counter by one.
    ///
    /// # Arguments
    /// * `name` - Counter name, e.g. "fncache.hit"
    /// * `tags` - Key-value tags, e.g. `[("function", "search")]`
    fn increment(&self, name: &str, tags: &[(&str, &str)]);
}

// == Noop Sink ==
/// Sink that discards every increment.
#[derive(Debug, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn increment(&self, _name: &str, _tags: &[(&str, &str)]) {}
}

// == In-Memory Sink ==
/// Sink that accumulates counters in process memory.
///
/// Useful for single-process deployments and for asserting operation counts
/// in tests. Counters are keyed by name only; tags are ignored.
#[derive(Debug, Default)]
pub struct MemoryMetrics {
    counters: Mutex<HashMap<String, u64>>,
}

impl MemoryMetrics {
    /// Creates a new sink with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current value of a counter, zero if never incremented.
    pub fn count(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .map(|counters| counters.get(name).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Returns a snapshot of every counter.
    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.counters
            .lock()
            .map(|counters| counters.clone())
            .unwrap_or_default()
    }
}

impl MetricsSink for MemoryMetrics {
    fn increment(&self, name: &str, _tags: &[(&str, &str)]) {
        if let Ok(mut counters) = self.counters.lock() {
            *counters.entry(name.to_string()).or_insert(0) += 1;
        }
    }
}
