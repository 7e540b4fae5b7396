//! # Trip Repository
//!
//! Database operations for trips.
//!
//! ## Trip Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Trip Lifecycle                                    │
//! │                                                                         │
//! │  1. OPEN                                                               │
//! │     └── create() → Trip { end_time: None }                             │
//! │         (partial unique indexes: one open trip per user and per car)   │
//! │                                                                         │
//! │  2. CLOSE                                                              │
//! │     └── close() → end_time, distance, driving_behavior set together    │
//! │         (only if still open; a second close affects zero rows)         │
//! │                                                                         │
//! │  Both steps run inside the rental coordinator's transaction.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use fleet_core::{ActiveTripCar, Rate, Trip, TripDetails, TripSummary};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use std::time::Duration;
use tracing::debug;

use crate::error::DbResult;
use crate::pool::bounded;

/// A history row carrying the windowed total of its listing.
#[derive(Debug, FromRow)]
struct CountedSummary {
    #[sqlx(flatten)]
    summary: TripSummary,
    total_count: i64,
}

#[derive(Debug, FromRow)]
struct CountedTrip {
    #[sqlx(flatten)]
    trip: Trip,
    total_count: i64,
}

/// A trip row joined with its car's rate.
#[derive(Debug, FromRow)]
struct TripWithRate {
    #[sqlx(flatten)]
    trip: Trip,
    cost_per_unit: Rate,
}

/// Repository for trip database operations.
#[derive(Debug, Clone)]
pub struct TripRepository {
    pool: SqlitePool,
    timeout: Duration,
}

impl TripRepository {
    /// Creates a new TripRepository.
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        TripRepository { pool, timeout }
    }

    /// The user's open trip, if any.
    pub async fn get_active_for_user(&self, email: &str) -> DbResult<Option<Trip>> {
        bounded(
            self.timeout,
            "get_active_trip",
            sqlx::query_as::<_, Trip>(
                r#"
                SELECT id, user_email, car_license_plate, start_time,
                       end_time, driving_behavior, distance
                FROM trips
                WHERE user_email = ?1 AND end_time IS NULL
                "#,
            )
            .bind(email)
            .fetch_optional(&self.pool),
        )
        .await
    }

    /// The user's open trip joined with the rate of its car.
    pub async fn find_active_trip_car(&self, email: &str) -> DbResult<Option<ActiveTripCar>> {
        debug!(email = %email, "Looking up active trip");

        bounded(
            self.timeout,
            "find_active_trip_car",
            sqlx::query_as::<_, ActiveTripCar>(
                r#"
                SELECT t.id AS trip_id, t.car_license_plate, c.cost_per_unit
                FROM trips t
                JOIN cars c ON c.license_plate = t.car_license_plate
                WHERE t.user_email = ?1 AND t.end_time IS NULL
                "#,
            )
            .bind(email)
            .fetch_optional(&self.pool),
        )
        .await
    }

    /// One of the user's trips with its car's rate. Another user's trip
    /// reads as missing.
    pub async fn get_for_user(&self, trip_id: &str, email: &str) -> DbResult<Option<TripDetails>> {
        let row = bounded(
            self.timeout,
            "get_trip",
            sqlx::query_as::<_, TripWithRate>(
                r#"
                SELECT t.id, t.user_email, t.car_license_plate, t.start_time,
                       t.end_time, t.driving_behavior, t.distance,
                       c.cost_per_unit
                FROM trips t
                JOIN cars c ON c.license_plate = t.car_license_plate
                WHERE t.id = ?1 AND t.user_email = ?2
                "#,
            )
            .bind(trip_id)
            .bind(email)
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.map(|row| TripDetails {
            trip: row.trip,
            cost_per_unit: row.cost_per_unit,
        }))
    }

    /// One page of a user's trips with their payments, newest first.
    ///
    /// ## Returns
    /// `(trips, total)` where `total` counts all of the user's trips.
    pub async fn list_for_user(
        &self,
        email: &str,
        limit: i64,
        offset: i64,
    ) -> DbResult<(Vec<TripSummary>, i64)> {
        debug!(email = %email, limit, offset, "Listing trips for user");

        let rows: Vec<CountedSummary> = bounded(
            self.timeout,
            "list_trips_for_user",
            sqlx::query_as::<_, CountedSummary>(
                r#"
                SELECT t.id, t.user_email, t.car_license_plate, t.start_time,
                       t.end_time, t.driving_behavior, t.distance,
                       p.amount_cents, p.payment_method,
                       COUNT(*) OVER () AS total_count
                FROM trips t
                LEFT JOIN payments p ON p.trip_id = t.id
                WHERE t.user_email = ?1
                ORDER BY t.start_time DESC, t.rowid DESC
                LIMIT ?2 OFFSET ?3
                "#,
            )
            .bind(email)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool),
        )
        .await?;

        let total = match rows.first() {
            Some(row) => row.total_count,
            None => self.count_for_user(email).await?,
        };

        Ok((rows.into_iter().map(|row| row.summary).collect(), total))
    }

    /// One page of the trips a car has been on, newest first.
    pub async fn list_for_car(
        &self,
        plate: &str,
        limit: i64,
        offset: i64,
    ) -> DbResult<(Vec<Trip>, i64)> {
        debug!(plate = %plate, limit, offset, "Listing trips for car");

        let rows: Vec<CountedTrip> = bounded(
            self.timeout,
            "list_trips_for_car",
            sqlx::query_as::<_, CountedTrip>(
                r#"
                SELECT id, user_email, car_license_plate, start_time,
                       end_time, driving_behavior, distance,
                       COUNT(*) OVER () AS total_count
                FROM trips
                WHERE car_license_plate = ?1
                ORDER BY start_time DESC, rowid DESC
                LIMIT ?2 OFFSET ?3
                "#,
            )
            .bind(plate)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool),
        )
        .await?;

        let total = match rows.first() {
            Some(row) => row.total_count,
            None => {
                bounded(
                    self.timeout,
                    "count_trips_for_car",
                    sqlx::query_scalar::<_, i64>(
                        "SELECT COUNT(*) FROM trips WHERE car_license_plate = ?1",
                    )
                    .bind(plate)
                    .fetch_one(&self.pool),
                )
                .await?
            }
        };

        Ok((rows.into_iter().map(|row| row.trip).collect(), total))
    }

    /// Number of trips, open or closed, the user has taken.
    pub async fn count_for_user(&self, email: &str) -> DbResult<i64> {
        bounded(
            self.timeout,
            "count_trips_for_user",
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM trips WHERE user_email = ?1")
                .bind(email)
                .fetch_one(&self.pool),
        )
        .await
    }

    // =========================================================================
    // Transactional writes (coordinator only)
    // =========================================================================

    /// Opens a trip.
    ///
    /// A second open trip for the same user or car fails with a unique
    /// violation on `trips.user_email` or `trips.car_license_plate`.
    pub(crate) async fn create(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        email: &str,
        plate: &str,
        start_time: DateTime<Utc>,
    ) -> DbResult<Trip> {
        debug!(id = %id, email = %email, plate = %plate, "Opening trip");

        bounded(
            self.timeout,
            "create_trip",
            sqlx::query_as::<_, Trip>(
                r#"
                INSERT INTO trips (id, user_email, car_license_plate, start_time)
                VALUES (?1, ?2, ?3, ?4)
                RETURNING id, user_email, car_license_plate, start_time,
                          end_time, driving_behavior, distance
                "#,
            )
            .bind(id)
            .bind(email)
            .bind(plate)
            .bind(start_time)
            .fetch_one(&mut *conn),
        )
        .await
    }

    /// Closes a trip that is still open.
    ///
    /// ## Returns
    /// * `Ok(Some(Trip))` - The closed trip
    /// * `Ok(None)` - Trip missing or already closed; nothing written
    pub(crate) async fn close(
        &self,
        conn: &mut SqliteConnection,
        trip_id: &str,
        end_time: DateTime<Utc>,
        distance: f64,
        driving_behavior: f64,
    ) -> DbResult<Option<Trip>> {
        debug!(id = %trip_id, distance, driving_behavior, "Closing trip");

        bounded(
            self.timeout,
            "close_trip",
            sqlx::query_as::<_, Trip>(
                r#"
                UPDATE trips
                SET end_time = ?2, distance = ?3, driving_behavior = ?4
                WHERE id = ?1 AND end_time IS NULL
                RETURNING id, user_email, car_license_plate, start_time,
                          end_time, driving_behavior, distance
                "#,
            )
            .bind(trip_id)
            .bind(end_time)
            .bind(distance)
            .bind(driving_behavior)
            .fetch_optional(&mut *conn),
        )
        .await
    }

    /// Completed trips of a user other than `trip_id`.
    pub(crate) async fn count_completed_excluding(
        &self,
        conn: &mut SqliteConnection,
        email: &str,
        trip_id: &str,
    ) -> DbResult<i64> {
        bounded(
            self.timeout,
            "count_completed_trips",
            sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COUNT(*) FROM trips
                WHERE user_email = ?1 AND end_time IS NOT NULL AND id <> ?2
                "#,
            )
            .bind(email)
            .bind(trip_id)
            .fetch_one(&mut *conn),
        )
        .await
    }
}
