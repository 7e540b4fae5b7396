//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use fleet_cache::{CacheError, CacheResult, CacheStore, MemoryCache};
use fleet_core::{Car, NewCar, NewUser, PaymentMethod, RequestValidator, StopTripRequest};
use fleet_db::{Database, DbConfig, Fleet};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

pub const RIDER: &str = "rider@example.com";
pub const OTHER_RIDER: &str = "other@example.com";
pub const PLATE: &str = "ABC1234";

/// Engine over an in-memory database and an inspectable in-process cache.
pub async fn fleet_with_memory_cache() -> (Fleet, Arc<MemoryCache>) {
    let cache = Arc::new(MemoryCache::new());
    let fleet = fleet_with_cache(cache.clone()).await;
    (fleet, cache)
}

pub async fn fleet() -> Fleet {
    fleet_with_memory_cache().await.0
}

pub async fn fleet_with_cache(cache: Arc<dyn CacheStore>) -> Fleet {
    let db = Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database");
    Fleet::with_cache(
        db,
        cache,
        Arc::new(RequestValidator::default()),
        Duration::from_secs(300),
    )
}

pub async fn add_rider(fleet: &Fleet, email: &str) {
    let username = email.split('@').next().unwrap_or(email).to_string();
    fleet
        .users()
        .ensure_user(NewUser {
            email: email.to_string(),
            username,
            full_name: None,
        })
        .await
        .expect("rider");
}

/// `rate` is the price per unit, e.g. `"0.50"`.
pub async fn add_car(fleet: &Fleet, plate: &str, rate: &str) -> Car {
    fleet
        .directory()
        .insert(NewCar {
            license_plate: plate.to_string(),
            make: "Toyota".to_string(),
            model: "Yaris".to_string(),
            cost_per_unit: rate.parse().expect("rate"),
            location: "Athens".to_string(),
            status: None,
        })
        .await
        .expect("car")
}

/// One rider, one AVAILABLE car `ABC1234` at 0.50 per unit.
pub async fn standard_fleet() -> Fleet {
    let fleet = fleet().await;
    add_rider(&fleet, RIDER).await;
    add_car(&fleet, PLATE, "0.50").await;
    fleet
}

/// `amount` is in cents.
pub fn stop_request(distance: Decimal, behavior: f64, amount_cents: i64, method: PaymentMethod) -> StopTripRequest {
    StopTripRequest {
        distance,
        driving_behavior: behavior,
        amount: Decimal::new(amount_cents, 2),
        payment_method: method,
    }
}

/// A cache whose every command fails.
#[derive(Debug, Default)]
pub struct FailingCache;

#[async_trait]
impl CacheStore for FailingCache {
    async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
        Err(CacheError::ConnectionFailed("cache is down".to_string()))
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> CacheResult<()> {
        Err(CacheError::ConnectionFailed("cache is down".to_string()))
    }

    async fn delete(&self, _key: &str) -> CacheResult<bool> {
        Err(CacheError::ConnectionFailed("cache is down".to_string()))
    }

    async fn incr(&self, _key: &str) -> CacheResult<u64> {
        Err(CacheError::ConnectionFailed("cache is down".to_string()))
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}
