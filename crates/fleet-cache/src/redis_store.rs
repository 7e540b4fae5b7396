//! # Redis Cache
//!
//! [`CacheStore`] backed by Redis through an auto-reconnecting
//! `ConnectionManager`. Cloning the manager is cheap; every call works on
//! its own clone.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{CacheError, CacheResult};
use crate::store::{ttl_secs, CacheStore};

/// Redis-backed [`CacheStore`].
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
    url: String,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache").field("url", &self.url).finish()
    }
}

impl RedisCache {
    /// Connects and verifies the server answers PING.
    pub async fn connect(url: &str) -> CacheResult<Self> {
        info!(url = %url, "Connecting to Redis");

        let client =
            redis::Client::open(url).map_err(|e| CacheError::ConnectionFailed(e.to_string()))?;
        let manager = ConnectionManager::new(client).await?;

        let mut conn = manager.clone();
        let _: () = redis::cmd("PING").query_async(&mut conn).await?;

        info!("Redis connected");
        Ok(RedisCache {
            manager,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        debug!(key = %key, hit = value.is_some(), "Redis GET");
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let mut conn = self.manager.clone();
        let secs = ttl_secs(ttl);
        let _: () = conn.set_ex(key, value, secs).await?;
        debug!(key = %key, ttl_secs = secs, "Redis SET");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.manager.clone();
        let removed: i64 = conn.del(key).await?;
        debug!(key = %key, removed, "Redis DEL");
        Ok(removed > 0)
    }

    async fn incr(&self, key: &str) -> CacheResult<u64> {
        let mut conn = self.manager.clone();
        let value: u64 = conn.incr(key, 1u64).await?;
        Ok(value)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
