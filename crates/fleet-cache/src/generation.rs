//! # Generation-Versioned Keys
//!
//! Every namespace (e.g. one per car listing filter) has a counter. Data
//! keys embed the counter's current value, so bumping the counter orphans
//! every page of that namespace at once; the orphans age out by TTL.
//!
//! ```text
//! cars:gen:available = 7
//!
//! read  ──► cars:available:g7:page=1:size=20   (hit or fill)
//!           cars:available:g7:page=9:size=13   (hit or fill)
//!
//! mutation ──► INCR cars:gen:available = 8
//!
//! read  ──► cars:available:g8:page=1:size=20   (miss, refilled from DB)
//! ```

use crate::error::{CacheError, CacheResult};
use crate::store::CacheStore;

/// Key builder for generation-versioned namespaces under one prefix.
#[derive(Debug, Clone)]
pub struct GenerationKeys {
    prefix: String,
}

impl GenerationKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        GenerationKeys {
            prefix: prefix.into(),
        }
    }

    /// Key of the counter for `namespace`.
    pub fn counter_key(&self, namespace: &str) -> String {
        format!("{}:gen:{}", self.prefix, namespace)
    }

    /// Data key inside `namespace` at `generation`.
    pub fn data_key(&self, namespace: &str, generation: u64, suffix: &str) -> String {
        format!("{}:{}:g{}:{}", self.prefix, namespace, generation, suffix)
    }

    /// Current generation of `namespace`; a missing counter is generation 0.
    pub async fn current(&self, store: &dyn CacheStore, namespace: &str) -> CacheResult<u64> {
        let key = self.counter_key(namespace);
        match store.get(&key).await? {
            Some(bytes) => std::str::from_utf8(&bytes)
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .ok_or(CacheError::NotACounter { key }),
            None => Ok(0),
        }
    }

    /// Moves `namespace` to a new generation and returns it.
    pub async fn bump(&self, store: &dyn CacheStore, namespace: &str) -> CacheResult<u64> {
        store.incr(&self.counter_key(namespace)).await
    }
}
