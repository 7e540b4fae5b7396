//! # In-Process Cache
//!
//! A `HashMap` behind a mutex. Used in development, in tests, and as the
//! fallback when Redis is not configured.
//!
//! Expired entries are dropped when read, and swept on write once the map
//! grows past a threshold. Pages left behind by a generation bump are never
//! read again, so the sweep is what reclaims them.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::store::{ttl_secs, CacheStore};

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    /// `None` for counters.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Map size that triggers the first sweep.
const SWEEP_THRESHOLD: usize = 256;

#[derive(Debug)]
struct Entries {
    map: HashMap<String, Entry>,
    /// Next map size at which writes sweep expired entries.
    sweep_at: usize,
}

impl Default for Entries {
    fn default() -> Self {
        Entries {
            map: HashMap::new(),
            sweep_at: SWEEP_THRESHOLD,
        }
    }
}

impl Entries {
    fn insert(&mut self, key: &str, entry: Entry, now: Instant) {
        if self.map.len() >= self.sweep_at {
            let before = self.map.len();
            self.map.retain(|_, e| e.is_live(now));
            // Live entries alone can exceed the threshold; back off so a
            // busy map is not rescanned on every write.
            self.sweep_at = (self.map.len() * 2).max(SWEEP_THRESHOLD);
            debug!(
                reclaimed = before - self.map.len(),
                remaining = self.map.len(),
                "Swept expired cache entries"
            );
        }
        self.map.insert(key.to_string(), entry);
    }
}

/// In-process [`CacheStore`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<Entries>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, Entries>> {
        self.entries.lock().map_err(|_| CacheError::Poisoned)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .map(|entries| entries.map.values().filter(|e| e.is_live(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let now = Instant::now();
        let mut entries = self.lock()?;

        match entries.map.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.map.remove(key);
                debug!(key = %key, "Cache entry expired");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let now = Instant::now();
        let expires_at = now + Duration::from_secs(ttl_secs(ttl));
        self.lock()?.insert(
            key,
            Entry {
                value: value.to_vec(),
                expires_at: Some(expires_at),
            },
            now,
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let now = Instant::now();
        Ok(self
            .lock()?
            .map
            .remove(key)
            .is_some_and(|entry| entry.is_live(now)))
    }

    async fn incr(&self, key: &str) -> CacheResult<u64> {
        let now = Instant::now();
        let mut entries = self.lock()?;

        let current = match entries.map.get(key) {
            Some(entry) if entry.is_live(now) => std::str::from_utf8(&entry.value)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or_else(|| CacheError::NotACounter {
                    key: key.to_string(),
                })?,
            _ => 0,
        };

        let next = current + 1;
        entries.insert(
            key,
            Entry {
                value: next.to_string().into_bytes(),
                expires_at: None,
            },
            now,
        );
        Ok(next)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
