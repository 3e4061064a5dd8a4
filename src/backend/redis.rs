//! Redis Backend
//!
//! Implements the store protocol against a shared Redis server using
//! multiplexed connections with bounded connect and response timeouts.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client};
use tracing::debug;

use crate::backend::StoreBackend;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Redis Backend ==
/// Store backend over a remote Redis server.
///
/// The connection manager reconnects on failure; individual commands are
/// bounded by the configured response timeout so an unreachable server
/// surfaces as a store error quickly instead of stalling the caller.
pub struct RedisBackend {
    connection: ConnectionManager,
}

impl RedisBackend {
    // == Constructor ==
    /// Connects to the Redis server named by the configuration.
    ///
    /// Fails with [`CacheError::Unavailable`] when no URL is configured and
    /// with [`CacheError::Store`] when the initial connection cannot be
    /// established within the connect timeout.
    pub async fn connect(config: &CacheConfig) -> Result<Self> {
        let url = config
            .redis_url
            .as_deref()
            .ok_or_else(|| CacheError::Unavailable("no Redis URL configured".to_string()))?;

        let client = Client::open(url)?;
        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(config.connect_timeout())
            .set_response_timeout(config.response_timeout())
            .set_number_of_retries(1);
        let connection = ConnectionManager::new_with_config(client, manager_config).await?;

        debug!(url, "connected to Redis");
        Ok(Self { connection })
    }

    /// Round-trips a PING to verify the connection.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl StoreBackend for RedisBackend {
    async fn hash_get(&self, namespace: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.hget(namespace, field).await?;
        Ok(value)
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
        let mut conn = self.connection.clone();
        redis::pipe()
            .hset(namespace, field, value)
            .ignore()
            .zadd(index, field, score)
            .ignore()
            .expire(namespace, ttl.as_secs() as i64)
            .ignore()
            .expire(index, ttl.as_secs() as i64)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn index_len(&self, index: &str) -> Result<u64> {
        let mut conn = self.connection.clone();
        let len: u64 = conn.zcard(index).await?;
        Ok(len)
    }

    async fn index_oldest(&self, index: &str, count: u64) -> Result<Vec<String>> {
        let mut conn = self.connection.clone();
        let stop = count.saturating_sub(1) as isize;
        let members: Vec<String> = conn.zrange(index, 0, stop).await?;
        Ok(members)
    }

    async fn remove_entries(&self, namespace: &str, index: &str, fields: &[String]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection.clone();
        // MULTI/EXEC so the hash and its index never diverge.
        redis::pipe()
            .atomic()
            .zrem(index, fields)
            .ignore()
            .hdel(namespace, fields)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64> {
        // SCAN first so the keyspace walk never blocks the server, then one
        // atomic DEL batch for the matches.
        let keys: Vec<String> = {
            let mut scan_conn = self.connection.clone();
            let mut iter = scan_conn.scan_match::<_, String>(pattern).await?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.connection.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in &keys {
            pipe.del(key).ignore();
        }
        pipe.query_async::<()>(&mut conn).await?;
        Ok(keys.len() as u64)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_without_url_is_unavailable() {
        let config = CacheConfig::default();
        let result = RedisBackend::connect(&config).await;
        match result {
            Err(err) => assert!(err.is_store()),
            Ok(_) => panic!("connect without a URL should fail"),
        }
    }
}
