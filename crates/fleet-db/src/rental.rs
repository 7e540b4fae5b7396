//! # Rental Coordinator
//!
//! Starts and stops trips as single units of work.
//!
//! ## StartTrip
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate ─► car exists? ─► AVAILABLE? ─► user known, no open trip?     │
//! │                                              │                          │
//! │  BEGIN ──────────────────────────────────────┘                          │
//! │    UPDATE cars SET status='RENTED'                                      │
//! │      WHERE plate=? AND status='AVAILABLE'   (0 rows ─► CarUnavailable)  │
//! │    INSERT trips (open)                      (unique index ─► conflict)  │
//! │  COMMIT ─► bump listing generations                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## StopTrip
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate ─► open trip + rate ─► fare == client amount?  (no writes)    │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    close trip (only if still open)                                      │
//! │    RENTED ─► AVAILABLE                                                  │
//! │    behavior average ← running_average(avg, completed, score)            │
//! │    active subscription? ─► amount 0, SUBSCRIPTION                       │
//! │    INSERT payment                                                       │
//! │  COMMIT ─► bump listing generations                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every failure inside a unit rolls it back; callers observe either all of
//! its writes or none of them. Cache invalidation runs after commit and
//! cannot fail the request.

use chrono::{DateTime, Utc};
use fleet_core::behavior::running_average;
use fleet_core::money::fare;
use fleet_core::types::page_offset;
use fleet_core::{
    ActiveTripCar, CarStatus, CoreError, Page, PaymentMethod, RequestValidator, StopTripRequest,
    Trip, TripDetails, TripReceipt, TripSummary, ValidationError, MAX_BEHAVIOR_SCORE,
};
use rust_decimal::prelude::ToPrimitive;
use sqlx::SqliteConnection;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::directory::CarDirectory;
use crate::error::{DbError, FleetError, FleetResult};
use crate::pool::Database;
use crate::repository::car::CarRepository;
use crate::repository::payment::PaymentRepository;
use crate::repository::subscription::SubscriptionRepository;
use crate::repository::trip::TripRepository;
use crate::repository::user::UserRepository;

/// Listings touched by every start and stop.
const RENTAL_STATUSES: [CarStatus; 2] = [CarStatus::Available, CarStatus::Rented];

/// Orchestrates trips, car status, payments, behavior averages and the
/// subscription override.
#[derive(Debug, Clone)]
pub struct RentalCoordinator {
    db: Database,
    cars: CarRepository,
    trips: TripRepository,
    payments: PaymentRepository,
    users: UserRepository,
    subscriptions: SubscriptionRepository,
    directory: CarDirectory,
    validator: Arc<RequestValidator>,
}

impl RentalCoordinator {
    pub fn new(db: Database, directory: CarDirectory, validator: Arc<RequestValidator>) -> Self {
        RentalCoordinator {
            cars: db.cars(),
            trips: db.trips(),
            payments: db.payments(),
            users: db.users(),
            subscriptions: db.subscriptions(),
            db,
            directory,
            validator,
        }
    }

    // =========================================================================
    // Start
    // =========================================================================

    /// Opens a trip for `email` on the car `plate`.
    ///
    /// ## Errors
    /// * `CarNotFound` / `UserNotFound`
    /// * `CarUnavailable` - the car is not AVAILABLE, including when another
    ///   start claimed it first
    /// * `ActiveTripExists` - the user already has an open trip
    pub async fn start_trip(&self, email: &str, plate: &str) -> FleetResult<Trip> {
        let email = self.validator.email(email)?;
        let plate = self.validator.license_plate(plate)?;

        let car = self
            .cars
            .get_by_plate(&plate)
            .await?
            .ok_or_else(|| CoreError::CarNotFound(plate.clone()))?;
        if !car.is_available() {
            return Err(CoreError::CarUnavailable {
                plate,
                status: car.status,
            }
            .into());
        }

        if !self.users.exists(&email).await? {
            return Err(CoreError::UserNotFound(email).into());
        }
        if self.trips.get_active_for_user(&email).await?.is_some() {
            return Err(CoreError::ActiveTripExists { email }.into());
        }

        let now = Utc::now();
        let trip_id = Uuid::new_v4().to_string();

        let mut tx = self.db.begin().await?;
        match self.open_trip(&mut *tx, &trip_id, &email, &plate, now).await {
            Ok(trip) => {
                self.db.commit(tx).await?;
                info!(trip_id = %trip.id, email = %email, plate = %plate, "Trip started");
                self.directory.invalidate_listings(&RENTAL_STATUSES).await;
                Ok(trip)
            }
            Err(e) => {
                warn!(email = %email, plate = %plate, error = %e, "Start trip rolled back");
                self.db.rollback(tx, "start_trip").await;
                Err(e)
            }
        }
    }

    async fn open_trip(
        &self,
        conn: &mut SqliteConnection,
        trip_id: &str,
        email: &str,
        plate: &str,
        now: DateTime<Utc>,
    ) -> FleetResult<Trip> {
        // Claim the car first; a concurrent start loses here.
        if !self.cars.mark_rented(&mut *conn, plate).await? {
            return Err(match self.cars.get_in(&mut *conn, plate).await? {
                Some(car) => CoreError::CarUnavailable {
                    plate: plate.to_string(),
                    status: car.status,
                },
                None => CoreError::CarNotFound(plate.to_string()),
            }
            .into());
        }

        self.trips
            .create(&mut *conn, trip_id, email, plate, now)
            .await
            .map_err(|e| open_trip_conflict(e, email, plate))
    }

    // =========================================================================
    // Stop
    // =========================================================================

    /// Closes the user's open trip and records its payment.
    ///
    /// The client's `amount` must equal `round(distance × rate, 2)`;
    /// otherwise nothing is written. With an active subscription the
    /// payment is recorded as zero via SUBSCRIPTION whatever the client sent.
    pub async fn stop_trip(&self, email: &str, request: StopTripRequest) -> FleetResult<TripReceipt> {
        let email = self.validator.email(email)?;
        self.validator.stop_trip(&request)?;

        let active = self
            .trips
            .find_active_trip_car(&email)
            .await?
            .ok_or_else(|| CoreError::NoActiveTrip {
                email: email.clone(),
            })?;

        let expected = fare(request.distance, active.cost_per_unit).ok_or_else(|| out_of_range("distance"))?;
        if expected.to_decimal() != request.amount {
            debug!(
                trip_id = %active.trip_id,
                expected = %expected,
                supplied = %request.amount,
                "Client amount rejected"
            );
            return Err(CoreError::AmountMismatch {
                expected: expected.to_decimal(),
                supplied: request.amount,
            }
            .into());
        }

        let distance = request.distance.to_f64().ok_or_else(|| out_of_range("distance"))?;

        let mut tx = self.db.begin().await?;
        let result = self
            .close_trip(
                &mut *tx,
                &email,
                &active,
                distance,
                &request,
                expected.cents(),
                Utc::now(),
            )
            .await;

        match result {
            Ok(receipt) => {
                self.db.commit(tx).await?;
                info!(
                    trip_id = %receipt.trip.id,
                    email = %email,
                    plate = %active.car_license_plate,
                    amount = %receipt.payment.amount(),
                    method = %receipt.payment.payment_method,
                    "Trip stopped"
                );
                self.directory.invalidate_listings(&RENTAL_STATUSES).await;
                Ok(receipt)
            }
            Err(e) => {
                warn!(trip_id = %active.trip_id, error = %e, "Stop trip rolled back");
                self.db.rollback(tx, "stop_trip").await;
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn close_trip(
        &self,
        conn: &mut SqliteConnection,
        email: &str,
        active: &ActiveTripCar,
        distance: f64,
        request: &StopTripRequest,
        fare_cents: i64,
        now: DateTime<Utc>,
    ) -> FleetResult<TripReceipt> {
        let trip = self
            .trips
            .close(&mut *conn, &active.trip_id, now, distance, request.driving_behavior)
            .await?
            .ok_or_else(|| CoreError::NoActiveTrip {
                email: email.to_string(),
            })?;

        let plate = &active.car_license_plate;
        if !self.cars.mark_available(&mut *conn, plate).await? {
            return Err(match self.cars.get_in(&mut *conn, plate).await? {
                Some(car) => CoreError::InvalidStatusChange {
                    plate: plate.clone(),
                    from: car.status,
                    to: CarStatus::Available,
                },
                None => CoreError::CarNotFound(plate.clone()),
            }
            .into());
        }

        self.fold_behavior(&mut *conn, email, &trip.id, request.driving_behavior)
            .await?;

        let (amount_cents, method) = match self.subscriptions.active_in(&mut *conn, email, now).await? {
            Some(subscription) => {
                debug!(
                    trip_id = %trip.id,
                    subscription_id = %subscription.id,
                    "Subscription covers trip"
                );
                (0, PaymentMethod::Subscription)
            }
            None if request.payment_method == PaymentMethod::Subscription => {
                return Err(ValidationError::NotAllowed {
                    field: "payment_method".to_string(),
                    allowed: vec![
                        PaymentMethod::Card.to_string(),
                        PaymentMethod::Crypto.to_string(),
                    ],
                }
                .into());
            }
            None => (fare_cents, request.payment_method),
        };

        let payment = self
            .payments
            .create(&mut *conn, &trip.id, amount_cents, method, now)
            .await?;

        Ok(TripReceipt { trip, payment })
    }

    /// Folds a closing trip's score into the user's running average.
    async fn fold_behavior(
        &self,
        conn: &mut SqliteConnection,
        email: &str,
        closing_trip_id: &str,
        score: f64,
    ) -> FleetResult<f64> {
        let current = self
            .users
            .driving_behavior_in(&mut *conn, email)
            .await?
            .ok_or_else(|| CoreError::UserNotFound(email.to_string()))?;
        let completed = self
            .trips
            .count_completed_excluding(&mut *conn, email, closing_trip_id)
            .await?;

        let average = running_average(current, completed, score).min(MAX_BEHAVIOR_SCORE);
        if !self
            .users
            .set_driving_behavior(&mut *conn, email, average)
            .await?
        {
            return Err(CoreError::UserNotFound(email.to_string()).into());
        }

        debug!(email = %email, completed = completed + 1, average, "Behavior average updated");
        Ok(average)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The user's open trip.
    pub async fn get_active_trip(&self, email: &str) -> FleetResult<Trip> {
        let email = self.validator.email(email)?;
        self.trips
            .get_active_for_user(&email)
            .await?
            .ok_or_else(|| CoreError::NoActiveTrip { email }.into())
    }

    /// The user's open trip with the plate and rate needed to bill it.
    pub async fn find_active_trip(&self, email: &str) -> FleetResult<ActiveTripCar> {
        let email = self.validator.email(email)?;
        self.trips
            .find_active_trip_car(&email)
            .await?
            .ok_or_else(|| CoreError::NoActiveTrip { email }.into())
    }

    /// One of the user's trips. Trips of other users are reported missing.
    pub async fn get_trip(&self, trip_id: &str, email: &str) -> FleetResult<TripDetails> {
        let email = self.validator.email(email)?;
        self.trips
            .get_for_user(trip_id, &email)
            .await?
            .ok_or_else(|| CoreError::TripNotFound(trip_id.to_string()).into())
    }

    /// The user's trips, newest first, with their payments.
    pub async fn list_trips_for_user(
        &self,
        email: &str,
        page: u32,
        page_size: u32,
    ) -> FleetResult<Page<TripSummary>> {
        let email = self.validator.email(email)?;
        self.validator.paging(page, page_size)?;

        let (items, total_count) = self
            .trips
            .list_for_user(&email, i64::from(page_size), page_offset(page, page_size))
            .await?;

        Ok(Page {
            items,
            total_count,
            page,
            page_size,
        })
    }

    /// Trips taken with one car, newest first.
    pub async fn list_trips_for_car(
        &self,
        plate: &str,
        page: u32,
        page_size: u32,
    ) -> FleetResult<Page<Trip>> {
        let plate = self.validator.license_plate(plate)?;
        self.validator.paging(page, page_size)?;

        let (items, total_count) = self
            .trips
            .list_for_car(&plate, i64::from(page_size), page_offset(page, page_size))
            .await?;

        Ok(Page {
            items,
            total_count,
            page,
            page_size,
        })
    }

    pub async fn count_trips_for_user(&self, email: &str) -> FleetResult<i64> {
        let email = self.validator.email(email)?;
        Ok(self.trips.count_for_user(&email).await?)
    }
}

/// Maps the open-trip unique indexes and the user foreign key onto
/// domain errors.
fn open_trip_conflict(err: DbError, email: &str, plate: &str) -> FleetError {
    if err.is_unique_violation_on("trips.user_email") {
        CoreError::ActiveTripExists {
            email: email.to_string(),
        }
        .into()
    } else if err.is_unique_violation_on("trips.car_license_plate") {
        CoreError::CarUnavailable {
            plate: plate.to_string(),
            status: CarStatus::Rented,
        }
        .into()
    } else if err.is_foreign_key_violation() {
        CoreError::UserNotFound(email.to_string()).into()
    } else {
        err.into()
    }
}

fn out_of_range(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: "0 (exclusive)".to_string(),
        max: "representable amount".to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::ErrorKind;

    #[test]
    fn test_open_trip_conflicts_map_to_domain_errors() {
        let err = open_trip_conflict(
            DbError::duplicate("trips.user_email", "unknown"),
            "ann@example.com",
            "ABC1234",
        );
        assert!(matches!(err, FleetError::Core(CoreError::ActiveTripExists { .. })));
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err = open_trip_conflict(
            DbError::duplicate("trips.car_license_plate", "unknown"),
            "ann@example.com",
            "ABC1234",
        );
        assert!(matches!(
            err,
            FleetError::Core(CoreError::CarUnavailable {
                status: CarStatus::Rented,
                ..
            })
        ));

        let err = open_trip_conflict(
            DbError::QueryFailed("disk I/O error".to_string()),
            "ann@example.com",
            "ABC1234",
        );
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
