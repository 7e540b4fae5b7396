//! Engine configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//!
//! | Variable                   | Default          |
//! |----------------------------|------------------|
//! | `FLEET_DATABASE_PATH`      | `fleet.db`       |
//! | `FLEET_DB_MAX_CONNECTIONS` | `5`              |
//! | `FLEET_DB_TIMEOUT_MS`      | `3000`           |
//! | `REDIS_URL`                | unset (in-process cache) |
//! | `FLEET_CACHE_TTL_SECS`     | `300`            |
//! | `FLEET_MAX_PAGE_SIZE`      | `100`            |

use fleet_cache::{CacheConfig, DEFAULT_LISTING_TTL};
use fleet_core::{ValidationLimits, MAX_PAGE_SIZE};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::pool::DbConfig;

const DEFAULT_DATABASE_PATH: &str = "fleet.db";

/// Everything process startup needs to build a [`Fleet`](crate::Fleet).
#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub database: DbConfig,
    pub cache: CacheConfig,
    pub limits: ValidationLimits,
}

impl FleetConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = lookup("FLEET_DATABASE_PATH")
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string());

        let max_connections: u32 = parse_or(&lookup, "FLEET_DB_MAX_CONNECTIONS", 5)?;
        if max_connections == 0 {
            return Err(ConfigError::InvalidValue("FLEET_DB_MAX_CONNECTIONS".to_string()));
        }

        let timeout_ms: u64 = parse_or(&lookup, "FLEET_DB_TIMEOUT_MS", 3000)?;
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidValue("FLEET_DB_TIMEOUT_MS".to_string()));
        }

        let database = DbConfig::new(path)
            .max_connections(max_connections)
            .statement_timeout(Duration::from_millis(timeout_ms));

        let ttl_secs: u64 = parse_or(&lookup, "FLEET_CACHE_TTL_SECS", DEFAULT_LISTING_TTL.as_secs())?;
        let cache = CacheConfig {
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            listing_ttl: Duration::from_secs(ttl_secs.max(1)),
        };

        let max_page_size: u32 = parse_or(&lookup, "FLEET_MAX_PAGE_SIZE", MAX_PAGE_SIZE)?;
        if max_page_size == 0 {
            return Err(ConfigError::InvalidValue("FLEET_MAX_PAGE_SIZE".to_string()));
        }
        let limits = ValidationLimits::default().max_page_size(max_page_size);

        Ok(FleetConfig {
            database,
            cache,
            limits,
        })
    }

    /// In-memory database and in-process cache (for tests).
    pub fn in_memory() -> Self {
        FleetConfig {
            database: DbConfig::in_memory(),
            cache: CacheConfig::default(),
            limits: ValidationLimits::default(),
        }
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
