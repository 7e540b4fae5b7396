//! Cache configuration and backend selection.

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::memory::MemoryCache;
use crate::redis_store::RedisCache;
use crate::store::CacheStore;

/// Default lifetime of a cached listing page.
pub const DEFAULT_LISTING_TTL: Duration = Duration::from_secs(300);

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Redis connection string; `None` selects the in-process cache.
    pub redis_url: Option<String>,

    /// TTL applied to cached listing pages.
    pub listing_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            redis_url: None,
            listing_ttl: DEFAULT_LISTING_TTL,
        }
    }
}

impl CacheConfig {
    pub fn redis(url: impl Into<String>) -> Self {
        CacheConfig {
            redis_url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn listing_ttl(mut self, ttl: Duration) -> Self {
        self.listing_ttl = ttl;
        self
    }

    /// Opens the configured backend.
    ///
    /// An unreachable Redis is not fatal: the cache only speeds up reads,
    /// so startup continues on the in-process store with a warning.
    pub async fn connect(&self) -> Arc<dyn CacheStore> {
        match &self.redis_url {
            Some(url) => match RedisCache::connect(url).await {
                Ok(redis) => Arc::new(redis),
                Err(e) => {
                    warn!(error = %e, "Redis unavailable, using in-process cache");
                    Arc::new(MemoryCache::new())
                }
            },
            None => {
                warn!("No Redis URL configured, using in-process cache");
                Arc::new(MemoryCache::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_without_redis_falls_back_to_memory() {
        let store = CacheConfig::default().connect().await;
        assert_eq!(store.backend(), "memory");
    }

    #[test]
    fn test_builder() {
        let config = CacheConfig::redis("redis://localhost:6379").listing_ttl(Duration::from_secs(30));
        assert_eq!(config.redis_url.as_deref(), Some("redis://localhost:6379"));
        assert_eq!(config.listing_ttl, Duration::from_secs(30));
    }
}
