//! In-Memory Backend
//!
//! Implements the store protocol in process memory: hash maps plus a sorted
//! recency index per namespace, with lazy TTL expiration on access. Suitable
//! for single-process deployments and for exercising cache policy in tests
//! without a Redis server.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::backend::{unix_ms, StoreBackend};
use crate::error::Result;

// == Hash Table ==
/// One namespace's hash map with whole-key expiration.
#[derive(Debug, Default)]
struct Table {
    fields: HashMap<String, String>,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    expires_at: Option<u64>,
}

impl Table {
    /// An entry is expired once the current time reaches the expiration time.
    fn is_expired(&self, now: u64) -> bool {
        matches!(self.expires_at, Some(expires) if now >= expires)
    }
}

// == Recency Index ==
/// One namespace's recency index: members ordered by score, oldest first.
#[derive(Debug, Default)]
struct Index {
    members: Vec<(u64, String)>,
    expires_at: Option<u64>,
}

impl Index {
    fn is_expired(&self, now: u64) -> bool {
        matches!(self.expires_at, Some(expires) if now >= expires)
    }

    /// Inserts or re-scores a member, keeping the vector sorted by
    /// (score, member).
    fn insert(&mut self, score: u64, member: &str) {
        self.members.retain(|(_, m)| m != member);
        let position = self
            .members
            .partition_point(|(s, m)| (*s, m.as_str()) < (score, member));
        self.members.insert(position, (score, member.to_string()));
    }

    fn remove(&mut self, member: &str) {
        self.members.retain(|(_, m)| m != member);
    }
}

// == Keyspace ==
#[derive(Debug, Default)]
struct Keyspace {
    hashes: HashMap<String, Table>,
    indexes: HashMap<String, Index>,
}

impl Keyspace {
    /// Drops expired keys touched by an operation. Expiration is lazy, the
    /// way Redis handles it for keys that are never read again.
    fn expire_now(&mut self, now: u64) {
        self.hashes.retain(|_, table| !table.is_expired(now));
        self.indexes.retain(|_, index| !index.is_expired(now));
    }
}

// == Memory Backend ==
/// Store backend held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    keyspace: RwLock<Keyspace>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fields currently stored in a namespace's hash map.
    pub async fn hash_len(&self, namespace: &str) -> usize {
        let keyspace = self.keyspace.read().await;
        keyspace
            .hashes
            .get(namespace)
            .map(|table| table.fields.len())
            .unwrap_or(0)
    }

    /// Total number of live keys (hashes and indexes).
    pub async fn key_count(&self) -> usize {
        let keyspace = self.keyspace.read().await;
        keyspace.hashes.len() + keyspace.indexes.len()
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn hash_get(&self, namespace: &str, field: &str) -> Result<Option<String>> {
        let mut keyspace = self.keyspace.write().await;
        keyspace.expire_now(unix_ms());
        Ok(keyspace
            .hashes
            .get(namespace)
            .and_then(|table| table.fields.get(field))
            .cloned())
    }

    async fn hash_put(
        &self,
        namespace: &str,
        index: &str,
        field: &str,
        value: &str,
        score: u64,
        ttl: Duration,
    ) -> Result<()> {
        let now = unix_ms();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let expires_at = Some(now.saturating_add(ttl_ms));

        let mut keyspace = self.keyspace.write().await;
        keyspace.expire_now(now);

        let table = keyspace.hashes.entry(namespace.to_string()).or_default();
        table.fields.insert(field.to_string(), value.to_string());
        table.expires_at = expires_at;

        let recency = keyspace.indexes.entry(index.to_string()).or_default();
        recency.insert(score, field);
        recency.expires_at = expires_at;
        Ok(())
    }

    async fn index_len(&self, index: &str) -> Result<u64> {
        let mut keyspace = self.keyspace.write().await;
        keyspace.expire_now(unix_ms());
        Ok(keyspace
            .indexes
            .get(index)
            .map(|recency| recency.members.len() as u64)
            .unwrap_or(0))
    }

    async fn index_oldest(&self, index: &str, count: u64) -> Result<Vec<String>> {
        let mut keyspace = self.keyspace.write().await;
        keyspace.expire_now(unix_ms());
        Ok(keyspace
            .indexes
            .get(index)
            .map(|recency| {
                recency
                    .members
                    .iter()
                    .take(count as usize)
                    .map(|(_, member)| member.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn remove_entries(&self, namespace: &str, index: &str, fields: &[String]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        // Single write lock, so the hash and index cannot diverge mid-removal.
        let mut keyspace = self.keyspace.write().await;
        if let Some(table) = keyspace.hashes.get_mut(namespace) {
            for field in fields {
                table.fields.remove(field);
            }
        }
        if let Some(recency) = keyspace.indexes.get_mut(index) {
            for field in fields {
                recency.remove(field);
            }
        }
        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64> {
        let mut keyspace = self.keyspace.write().await;
        keyspace.expire_now(unix_ms());
        let before = keyspace.hashes.len() + keyspace.indexes.len();
        keyspace.hashes.retain(|key, _| !glob_match(pattern, key));
        keyspace.indexes.retain(|key, _| !glob_match(pattern, key));
        let after = keyspace.hashes.len() + keyspace.indexes.len();
        Ok((before - after) as u64)
    }
}

// == Glob Matching ==
/// Matches a key against a glob pattern supporting `*` wildcards, the subset
/// of Redis MATCH syntax the cache emits.
fn glob_match(pattern: &str, key: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    if segments.len() == 1 {
        return pattern == key;
    }

    let mut remainder = key;
    for (position, segment) in segments.iter().enumerate() {
        if position == 0 {
            match remainder.strip_prefix(segment) {
                Some(rest) => remainder = rest,
                None => return false,
            }
        } else if position == segments.len() - 1 {
            return segment.is_empty() || remainder.ends_with(segment);
        } else if segment.is_empty() {
            continue;
        } else {
            match remainder.find(segment) {
                Some(found) => remainder = &remainder[found + segment.len()..],
                None => return false,
            }
        }
    }
    true
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get_field() {
        let backend = MemoryBackend::new();
        backend
            .hash_put("lru:untagged:f", "lru:untagged:f:index", "[1]", "42", 1, Duration::from_secs(60))
            .await
            .unwrap();

        let value = backend.hash_get("lru:untagged:f", "[1]").await.unwrap();
        assert_eq!(value, Some("42".to_string()));
    }

    #[tokio::test]
    async fn test_get_missing_field() {
        let backend = MemoryBackend::new();
        let value = backend.hash_get("lru:untagged:f", "[1]").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_index_tracks_insertion_order() {
        let backend = MemoryBackend::new();
        let ns = "lru:untagged:f";
        let idx = "lru:untagged:f:index";
        backend.hash_put(ns, idx, "a", "1", 10, Duration::from_secs(60)).await.unwrap();
        backend.hash_put(ns, idx, "b", "2", 20, Duration::from_secs(60)).await.unwrap();
        backend.hash_put(ns, idx, "c", "3", 30, Duration::from_secs(60)).await.unwrap();

        assert_eq!(backend.index_len(idx).await.unwrap(), 3);
        let oldest = backend.index_oldest(idx, 2).await.unwrap();
        assert_eq!(oldest, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_rewrite_rescores_member() {
        let backend = MemoryBackend::new();
        let ns = "lru:untagged:f";
        let idx = "lru:untagged:f:index";
        backend.hash_put(ns, idx, "a", "1", 10, Duration::from_secs(60)).await.unwrap();
        backend.hash_put(ns, idx, "b", "2", 20, Duration::from_secs(60)).await.unwrap();
        backend.hash_put(ns, idx, "a", "1", 30, Duration::from_secs(60)).await.unwrap();

        assert_eq!(backend.index_len(idx).await.unwrap(), 2);
        let oldest = backend.index_oldest(idx, 1).await.unwrap();
        assert_eq!(oldest, vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_remove_entries_keeps_lockstep() {
        let backend = MemoryBackend::new();
        let ns = "lru:untagged:f";
        let idx = "lru:untagged:f:index";
        backend.hash_put(ns, idx, "a", "1", 10, Duration::from_secs(60)).await.unwrap();
        backend.hash_put(ns, idx, "b", "2", 20, Duration::from_secs(60)).await.unwrap();

        backend
            .remove_entries(ns, idx, &["a".to_string()])
            .await
            .unwrap();

        assert_eq!(backend.hash_len(ns).await, 1);
        assert_eq!(backend.index_len(idx).await.unwrap(), 1);
        assert_eq!(backend.hash_get(ns, "a").await.unwrap(), None);
        assert!(backend.hash_get(ns, "b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_ttl_expires_whole_namespace() {
        let backend = MemoryBackend::new();
        let ns = "lru:untagged:f";
        let idx = "lru:untagged:f:index";
        backend.hash_put(ns, idx, "a", "1", 10, Duration::from_millis(20)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(backend.hash_get(ns, "a").await.unwrap(), None);
        assert_eq!(backend.index_len(idx).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_extreme_ttl_saturates_instead_of_overflowing() {
        let backend = MemoryBackend::new();
        let ns = "lru:untagged:f";
        let idx = "lru:untagged:f:index";
        backend
            .hash_put(ns, idx, "a", "1", 10, Duration::from_secs(u64::MAX))
            .await
            .unwrap();

        // The expiration clamps to the far future; the entry stays readable.
        let value = backend.hash_get(ns, "a").await.unwrap();
        assert_eq!(value, Some("1".to_string()));
    }

    #[tokio::test]
    async fn test_delete_matching_removes_hash_and_index() {
        let backend = MemoryBackend::new();
        backend
            .hash_put("lru:user/1:f", "lru:user/1:f:index", "a", "1", 10, Duration::from_secs(60))
            .await
            .unwrap();
        backend
            .hash_put("lru:user/2:f", "lru:user/2:f:index", "a", "1", 10, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(backend.key_count().await, 4);
        let deleted = backend.delete_matching("lru:user/1:*").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(backend.key_count().await, 2);
        assert_eq!(backend.hash_get("lru:user/1:f", "a").await.unwrap(), None);
        assert!(backend.hash_get("lru:user/2:f", "a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_matching_no_matches_is_noop() {
        let backend = MemoryBackend::new();
        let deleted = backend.delete_matching("lru:ghost:*").await.unwrap();
        assert_eq!(deleted, 0);
    }

    #[test]
    fn test_glob_match_literal() {
        assert!(glob_match("lru:tag:f", "lru:tag:f"));
        assert!(!glob_match("lru:tag:f", "lru:tag:g"));
    }

    #[test]
    fn test_glob_match_trailing_star() {
        assert!(glob_match("lru:tag:*", "lru:tag:f"));
        assert!(glob_match("lru:tag:*", "lru:tag:f:index"));
        assert!(!glob_match("lru:tag:*", "lru:other:f"));
    }

    #[test]
    fn test_glob_match_inner_star() {
        assert!(glob_match("lru:*:f", "lru:tag:f"));
        assert!(!glob_match("lru:*:f", "lru:tag:g"));
    }
}
