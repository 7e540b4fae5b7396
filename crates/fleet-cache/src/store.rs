//! # Cache Store Protocol
//!
//! The byte-level protocol every backend implements, plus JSON helpers.
//!
//! ```text
//! Set(key, bytes, ttl)   Get(key) -> bytes | miss
//! Delete(key) -> hit | miss    Incr(key) -> new value
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::time::Duration;

use crate::error::CacheResult;

/// A shared key/value store with TTL expiry.
///
/// Implementations must be safe to share across request tasks behind an
/// `Arc<dyn CacheStore>`.
#[async_trait]
pub trait CacheStore: Send + Sync + Debug {
    /// Returns the stored bytes, or `None` on a miss or expired entry.
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Stores `value` under `key` for `ttl`. Sub-second TTLs round up to 1s.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()>;

    /// Removes `key`. Returns `true` if something was deleted.
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Atomically increments the counter at `key` (missing counts as 0)
    /// and returns the new value. Counters never expire.
    async fn incr(&self, key: &str) -> CacheResult<u64>;

    /// Backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Whole seconds for a TTL, never below one.
pub(crate) fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

/// Reads and decodes a JSON value.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn CacheStore,
    key: &str,
) -> CacheResult<Option<T>> {
    match store.get(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Encodes and stores a JSON value.
pub async fn set_json<T: Serialize + Sync>(
    store: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> CacheResult<()> {
    let bytes = serde_json::to_vec(value)?;
    store.set(key, &bytes, ttl).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_rounding() {
        assert_eq!(ttl_secs(Duration::from_secs(300)), 300);
        assert_eq!(ttl_secs(Duration::from_millis(1500)), 2);
        assert_eq!(ttl_secs(Duration::ZERO), 1);
    }
}
