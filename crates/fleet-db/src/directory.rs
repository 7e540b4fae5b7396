//! # Car Directory
//!
//! Car records, the direct edit path, and cache-aside listings.
//!
//! ## Cache-Aside Read
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      list(filter, page, size)                           │
//! │                                                                         │
//! │  1. gen = GET cars:gen:{filter}          (missing counter = 0)         │
//! │  2. GET cars:{filter}:g{gen}:page={p}:size={s}                         │
//! │       ├── hit  ──► return cached Page                                  │
//! │       └── miss ──► SELECT ... COUNT(*) OVER () ... LIMIT/OFFSET        │
//! │                    SET key (TTL) ──► return Page                       │
//! │                                                                         │
//! │  Mutation (insert / update / delete / start / stop):                    │
//! │       INCR cars:gen:all + cars:gen:{each affected status}               │
//! │       ──► every page of those filters is unreachable at once            │
//! │                                                                         │
//! │  Any cache failure is logged and the database answers instead.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The generation is read before the database. A page computed from data
//! that a concurrent mutation then replaces is stored under the old
//! generation, which readers have already left behind.

use fleet_cache::{get_json, set_json, CacheStore, GenerationKeys};
use fleet_core::types::page_offset;
use fleet_core::{
    Car, CarFilter, CarPatch, CarStatus, CoreError, NewCar, Page, RequestValidator,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{FleetError, FleetResult};
use crate::repository::car::CarRepository;

/// Cache prefix of car listings.
const LISTING_PREFIX: &str = "cars";

/// Car records and their cached listings.
#[derive(Debug, Clone)]
pub struct CarDirectory {
    cars: CarRepository,
    cache: Arc<dyn CacheStore>,
    keys: GenerationKeys,
    listing_ttl: Duration,
    validator: Arc<RequestValidator>,
}

impl CarDirectory {
    pub fn new(
        cars: CarRepository,
        cache: Arc<dyn CacheStore>,
        listing_ttl: Duration,
        validator: Arc<RequestValidator>,
    ) -> Self {
        CarDirectory {
            cars,
            cache,
            keys: GenerationKeys::new(LISTING_PREFIX),
            listing_ttl,
            validator,
        }
    }

    /// Gets a car by plate. The plate is normalized first.
    pub async fn get(&self, plate: &str) -> FleetResult<Car> {
        let plate = self.validator.license_plate(plate)?;
        self.load(&plate).await
    }

    /// One page of cars for `filter`, served from the cache when possible.
    ///
    /// ## Arguments
    /// * `page` - 1-based page number
    /// * `page_size` - Between 1 and the configured maximum
    pub async fn list(&self, filter: CarFilter, page: u32, page_size: u32) -> FleetResult<Page<Car>> {
        self.validator.paging(page, page_size)?;

        let key = self.listing_key(filter, page, page_size).await;

        if let Some(key) = &key {
            match get_json::<Page<Car>>(self.cache.as_ref(), key).await {
                Ok(Some(cached)) => {
                    debug!(key = %key, "Car listing cache hit");
                    return Ok(cached);
                }
                Ok(None) => debug!(key = %key, "Car listing cache miss"),
                Err(e) => warn!(key = %key, error = %e, "Car listing cache read failed"),
            }
        }

        let (items, total_count) = self
            .cars
            .list(
                filter.status(),
                i64::from(page_size),
                page_offset(page, page_size),
            )
            .await?;

        let listing = Page {
            items,
            total_count,
            page,
            page_size,
        };

        if let Some(key) = &key {
            if let Err(e) =
                set_json(self.cache.as_ref(), key, &listing, self.listing_ttl).await
            {
                warn!(key = %key, error = %e, "Car listing cache write failed");
            }
        }

        Ok(listing)
    }

    /// Registers a car.
    ///
    /// Starts AVAILABLE unless MAINTENANCE is requested.
    pub async fn insert(&self, car: NewCar) -> FleetResult<Car> {
        let car = self.validator.new_car(car)?;

        let inserted = self.cars.insert(&car).await.map_err(|e| {
            if e.is_unique_violation_on("cars.license_plate") {
                FleetError::from(CoreError::DuplicateCar(car.license_plate.clone()))
            } else {
                e.into()
            }
        })?;

        info!(plate = %inserted.license_plate, status = %inserted.status, "Car registered");
        self.invalidate_listings(&[inserted.status]).await;

        Ok(inserted)
    }

    /// Applies a sparse edit through the direct edit path.
    ///
    /// A RENTED car cannot be edited, and no edit can set RENTED; those
    /// transitions belong to the rental coordinator.
    pub async fn update(&self, plate: &str, patch: CarPatch) -> FleetResult<Car> {
        let plate = self.validator.license_plate(plate)?;
        let patch = self.validator.car_patch(patch)?;

        let current = self.load(&plate).await?;
        check_direct_edit(&current, &patch)?;

        let updated = match self.cars.update(&plate, current.status, &patch).await? {
            Some(car) => car,
            None => return Err(self.lost_race(&plate, patch.status).await),
        };

        info!(
            plate = %plate,
            from = %current.status,
            to = %updated.status,
            "Car updated"
        );
        self.invalidate_listings(&[current.status, updated.status])
            .await;

        Ok(updated)
    }

    /// Direct status edit: AVAILABLE ↔ MAINTENANCE.
    pub async fn set_status(&self, plate: &str, status: CarStatus) -> FleetResult<Car> {
        self.update(plate, CarPatch::new().status(status)).await
    }

    /// Removes a car that is not rented and has no trip history.
    pub async fn delete(&self, plate: &str) -> FleetResult<Car> {
        let plate = self.validator.license_plate(plate)?;

        let current = self.load(&plate).await?;
        if current.status == CarStatus::Rented {
            return Err(CoreError::CarInUse(plate).into());
        }

        let deleted = self
            .cars
            .delete(&plate, current.status)
            .await
            .map_err(|e| {
                if e.is_foreign_key_violation() {
                    FleetError::from(CoreError::CarHasHistory(plate.clone()))
                } else {
                    e.into()
                }
            })?;

        let deleted = match deleted {
            Some(car) => car,
            None => return Err(self.lost_race(&plate, None).await),
        };

        info!(plate = %plate, "Car deleted");
        self.invalidate_listings(&[deleted.status]).await;

        Ok(deleted)
    }

    /// Bumps the generation of every listing that could contain a car with
    /// one of `statuses`. Failures are logged and otherwise ignored.
    pub(crate) async fn invalidate_listings(&self, statuses: &[CarStatus]) {
        for filter in CarFilter::affected_by(statuses) {
            match self.keys.bump(self.cache.as_ref(), filter.tag()).await {
                Ok(generation) => {
                    debug!(filter = filter.tag(), generation, "Car listings invalidated")
                }
                Err(e) => warn!(
                    filter = filter.tag(),
                    error = %e,
                    "Car listing invalidation failed"
                ),
            }
        }
    }

    async fn load(&self, plate: &str) -> FleetResult<Car> {
        self.cars
            .get_by_plate(plate)
            .await?
            .ok_or_else(|| CoreError::CarNotFound(plate.to_string()).into())
    }

    /// Cache key of a listing page, or `None` when the generation cannot be
    /// read and the cache has to be bypassed.
    async fn listing_key(&self, filter: CarFilter, page: u32, page_size: u32) -> Option<String> {
        match self.keys.current(self.cache.as_ref(), filter.tag()).await {
            Ok(generation) => Some(self.keys.data_key(
                filter.tag(),
                generation,
                &format!("page={page}:size={page_size}"),
            )),
            Err(e) => {
                warn!(filter = filter.tag(), error = %e, "Car listing generation unavailable");
                None
            }
        }
    }

    /// Explains a guarded write that matched no row: the car vanished or
    /// its status moved underneath the edit.
    async fn lost_race(&self, plate: &str, wanted: Option<CarStatus>) -> FleetError {
        match self.cars.get_by_plate(plate).await {
            Ok(None) => CoreError::CarNotFound(plate.to_string()).into(),
            Ok(Some(car)) if car.status == CarStatus::Rented => {
                CoreError::CarInUse(plate.to_string()).into()
            }
            Ok(Some(car)) => CoreError::InvalidStatusChange {
                plate: plate.to_string(),
                from: car.status,
                to: wanted.unwrap_or(car.status),
            }
            .into(),
            Err(e) => e.into(),
        }
    }
}

/// Rules of the direct edit path.
fn check_direct_edit(current: &Car, patch: &CarPatch) -> Result<(), CoreError> {
    if let Some(to) = patch.status {
        if !current.status.allows_direct_edit(to) {
            return Err(CoreError::InvalidStatusChange {
                plate: current.license_plate.clone(),
                from: current.status,
                to,
            });
        }
    }

    if current.status == CarStatus::Rented {
        return Err(CoreError::CarInUse(current.license_plate.clone()));
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn car(status: CarStatus) -> Car {
        Car {
            license_plate: "ABC1234".to_string(),
            make: "Toyota".to_string(),
            model: "Yaris".to_string(),
            status,
            cost_per_unit: "0.50".parse().unwrap(),
            location: "ATHENS".to_string(),
        }
    }

    #[test]
    fn test_direct_edit_allows_maintenance_toggle() {
        let patch = CarPatch::new().status(CarStatus::Maintenance);
        assert!(check_direct_edit(&car(CarStatus::Available), &patch).is_ok());

        let patch = CarPatch::new().status(CarStatus::Available);
        assert!(check_direct_edit(&car(CarStatus::Maintenance), &patch).is_ok());
    }

    #[test]
    fn test_direct_edit_never_touches_rented() {
        let into_rented = CarPatch::new().status(CarStatus::Rented);
        assert!(matches!(
            check_direct_edit(&car(CarStatus::Available), &into_rented),
            Err(CoreError::InvalidStatusChange { .. })
        ));

        let out_of_rented = CarPatch::new().status(CarStatus::Available);
        assert!(matches!(
            check_direct_edit(&car(CarStatus::Rented), &out_of_rented),
            Err(CoreError::InvalidStatusChange { .. })
        ));

        let relocate = CarPatch::new().location("PATRAS");
        assert!(matches!(
            check_direct_edit(&car(CarStatus::Rented), &relocate),
            Err(CoreError::CarInUse(_))
        ));
    }

    #[test]
    fn test_non_status_edit_of_idle_car() {
        let patch = CarPatch::new().cost_per_unit("0.75".parse().unwrap());
        assert!(check_direct_edit(&car(CarStatus::Maintenance), &patch).is_ok());
    }
}
