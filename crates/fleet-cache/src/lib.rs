//! # fleet-cache: Cache-Aside Store
//!
//! The read-side cache in front of the car directory.
//!
//! ## Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CarDirectory::list(filter, page, size)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  GenerationKeys ── cars:gen:{filter} ──► data key for this generation  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Arc<dyn CacheStore>  ── hit ──► decode page                            │
//! │       │                                                                 │
//! │       └── miss ──► SQLite ──► set_json(key, page, ttl)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The cache is never authoritative: every error here is logged by the
//! caller and the database answers instead.
//!
//! ## Modules
//!
//! - [`store`] - The `CacheStore` protocol and JSON helpers
//! - [`memory`] - In-process backend
//! - [`redis_store`] - Redis backend
//! - [`generation`] - Generation-versioned key spaces
//! - [`config`] - Backend selection
//! - [`error`] - Cache error types

pub mod config;
pub mod error;
pub mod generation;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use config::{CacheConfig, DEFAULT_LISTING_TTL};
pub use error::{CacheError, CacheResult};
pub use generation::GenerationKeys;
pub use memory::MemoryCache;
pub use redis_store::RedisCache;
pub use store::{get_json, set_json, CacheStore};
