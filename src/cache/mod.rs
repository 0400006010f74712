pub mod keys;

use redis::{aio::MultiplexedConnection, AsyncCommands};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

/// Thin read-through/invalidate wrapper around Redis.
///
/// Cached values are JSON snapshots of response bodies with handler-specific
/// TTLs; they are never the source of truth. Every Redis failure is logged
/// and degrades to a cache miss so the persistent store stays authoritative.
#[derive(Clone)]
pub struct CacheService {
    client: Option<redis::Client>,
}

impl CacheService {
    pub fn connect(url: &str) -> Self {
        match redis::Client::open(url) {
            Ok(client) => {
                debug!("Redis client created for {}", url);
                Self {
                    client: Some(client),
                }
            }
            Err(e) => {
                warn!("Failed to create Redis client ({}); caching disabled", e);
                Self { client: None }
            }
        }
    }

    /// A cache that always misses. Used by tests and as the fallback when
    /// Redis is unreachable.
    pub fn disabled() -> Self {
        Self { client: None }
    }

    async fn conn(&self) -> Option<MultiplexedConnection> {
        let client = self.client.as_ref()?;
        match client.get_multiplexed_tokio_connection().await {
            Ok(conn) => Some(conn),
            Err(e) => {
                warn!("Failed to get Redis connection: {}", e);
                None
            }
        }
    }

    pub async fn get_raw(&self, key: &str) -> Option<String> {
        let mut conn = self.conn().await?;
        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(data)) => {
                debug!("Cache hit: {}", key);
                Some(data)
            }
            Ok(None) => {
                debug!("Cache miss: {}", key);
                None
            }
            Err(e) => {
                warn!("Failed to get key '{}': {}", key, e);
                None
            }
        }
    }

    pub async fn set_raw(&self, key: &str, value: String, ttl_seconds: u64) {
        let Some(mut conn) = self.conn().await else {
            return;
        };
        if let Err(e) = conn
            .set_ex::<_, _, ()>(key, value, ttl_seconds)
            .await
        {
            warn!("Failed to cache key '{}': {}", key, e);
        } else {
            debug!("Cached key {} (TTL: {}s)", key, ttl_seconds);
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Discarding undecodable cache entry '{}': {}", key, e);
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set_raw(key, raw, ttl_seconds).await,
            Err(e) => warn!("Failed to serialize cache entry '{}': {}", key, e),
        }
    }

    pub async fn invalidate(&self, key: &str) {
        let Some(mut conn) = self.conn().await else {
            return;
        };
        match conn.del::<_, i64>(key).await {
            Ok(n) => debug!("Invalidated {} ({} removed)", key, n),
            Err(e) => warn!("Failed to invalidate key '{}': {}", key, e),
        }
    }

    /// Deletes every key matching a glob pattern via an incremental SCAN.
    /// Used for fan-out invalidations such as `leaderboard:{teacher}:*` and
    /// `student:*:batch:{batch}:quizzes`, where the exact key set is unknown.
    pub async fn invalidate_pattern(&self, pattern: &str) {
        let Some(mut conn) = self.conn().await else {
            return;
        };

        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter = match conn.scan_match::<_, String>(pattern).await {
                Ok(iter) => iter,
                Err(e) => {
                    warn!("SCAN failed for pattern '{}': {}", pattern, e);
                    return;
                }
            };
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        if keys.is_empty() {
            debug!("No cache entries matched pattern '{}'", pattern);
            return;
        }

        let count = keys.len();
        match conn.del::<_, i64>(keys).await {
            Ok(_) => debug!("Invalidated {} entries for pattern '{}'", count, pattern),
            Err(e) => warn!("Failed to delete keys for pattern '{}': {}", pattern, e),
        }
    }
}
