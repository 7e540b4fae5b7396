//! # Car Repository
//!
//! Database operations for cars.
//!
//! ## Two Write Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Who May Write cars.status                            │
//! │                                                                         │
//! │  Administrative path (pub)          Rental path (pub(crate))            │
//! │  ─────────────────────────          ─────────────────────────           │
//! │  insert / update / delete           mark_rented   AVAILABLE → RENTED    │
//! │  guarded by the status observed     mark_available RENTED → AVAILABLE   │
//! │  when the rules were checked        only inside a coordinator tx        │
//! │                                                                         │
//! │  Both paths are compare-and-swap updates: the WHERE clause names the   │
//! │  status the caller expects, and zero affected rows means it changed.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Listing
//! Pages are counted with a window aggregate (`COUNT(*) OVER ()`) so the
//! page and its total come back in one query.

use fleet_core::{Car, CarPatch, CarStatus, NewCar};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::time::Duration;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::pool::bounded;

const CAR_COLUMNS: &str = "license_plate, make, model, status, cost_per_unit, location";

/// A car row carrying the windowed total of its listing.
#[derive(Debug, FromRow)]
struct CountedCar {
    #[sqlx(flatten)]
    car: Car,
    total_count: i64,
}

/// Repository for car database operations.
#[derive(Debug, Clone)]
pub struct CarRepository {
    pool: SqlitePool,
    timeout: Duration,
}

impl CarRepository {
    /// Creates a new CarRepository.
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        CarRepository { pool, timeout }
    }

    /// Gets a car by its (normalized) license plate.
    ///
    /// ## Returns
    /// * `Ok(Some(Car))` - Car found
    /// * `Ok(None)` - No such plate
    pub async fn get_by_plate(&self, plate: &str) -> DbResult<Option<Car>> {
        debug!(plate = %plate, "Fetching car");
        fetch_car(self.timeout, &self.pool, plate).await
    }

    /// Lists one page of cars, optionally restricted to a status.
    ///
    /// ## Returns
    /// `(cars, total)` where `total` counts every matching car, not just
    /// this page. Ordered by license plate.
    pub async fn list(
        &self,
        status: Option<CarStatus>,
        limit: i64,
        offset: i64,
    ) -> DbResult<(Vec<Car>, i64)> {
        debug!(status = ?status, limit, offset, "Listing cars");

        let sql = format!(
            r#"
            SELECT {CAR_COLUMNS}, COUNT(*) OVER () AS total_count
            FROM cars
            WHERE (?1 IS NULL OR status = ?1)
            ORDER BY license_plate
            LIMIT ?2 OFFSET ?3
            "#
        );

        let rows: Vec<CountedCar> = bounded(
            self.timeout,
            "list_cars",
            sqlx::query_as::<_, CountedCar>(&sql)
                .bind(status)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool),
        )
        .await?;

        // A page past the end has no rows to carry the window total.
        let total = match rows.first() {
            Some(row) => row.total_count,
            None => self.count(status).await?,
        };

        Ok((rows.into_iter().map(|row| row.car).collect(), total))
    }

    /// Counts cars, optionally restricted to a status.
    pub async fn count(&self, status: Option<CarStatus>) -> DbResult<i64> {
        bounded(
            self.timeout,
            "count_cars",
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM cars WHERE (?1 IS NULL OR status = ?1)",
            )
            .bind(status)
            .fetch_one(&self.pool),
        )
        .await
    }

    /// Inserts a validated car.
    ///
    /// A duplicate plate surfaces as `DbError::UniqueViolation` on
    /// `cars.license_plate`.
    pub async fn insert(&self, car: &NewCar) -> DbResult<Car> {
        let status = car.status.unwrap_or(CarStatus::Available);
        debug!(plate = %car.license_plate, status = %status, "Inserting car");

        let sql = format!(
            r#"
            INSERT INTO cars ({CAR_COLUMNS})
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING {CAR_COLUMNS}
            "#
        );

        bounded(
            self.timeout,
            "insert_car",
            sqlx::query_as::<_, Car>(&sql)
                .bind(&car.license_plate)
                .bind(&car.make)
                .bind(&car.model)
                .bind(status)
                .bind(car.cost_per_unit)
                .bind(&car.location)
                .fetch_one(&self.pool),
        )
        .await
    }

    /// Applies a sparse update, but only while the car still has
    /// `expected_status`.
    ///
    /// Only fields present in `patch` are assigned. An empty patch is a
    /// caller bug and is answered with the current row.
    ///
    /// ## Returns
    /// * `Ok(Some(Car))` - Updated row
    /// * `Ok(None)` - Plate missing or status changed since it was read
    pub async fn update(
        &self,
        plate: &str,
        expected_status: CarStatus,
        patch: &CarPatch,
    ) -> DbResult<Option<Car>> {
        if patch.is_empty() {
            return self.get_by_plate(plate).await;
        }

        debug!(plate = %plate, patch = ?patch, "Updating car");

        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE cars SET ");
        {
            let mut assignments = query.separated(", ");
            if let Some(make) = &patch.make {
                assignments.push("make = ").push_bind_unseparated(make.clone());
            }
            if let Some(model) = &patch.model {
                assignments.push("model = ").push_bind_unseparated(model.clone());
            }
            if let Some(status) = patch.status {
                assignments.push("status = ").push_bind_unseparated(status);
            }
            if let Some(rate) = patch.cost_per_unit {
                assignments
                    .push("cost_per_unit = ")
                    .push_bind_unseparated(rate);
            }
            if let Some(location) = &patch.location {
                assignments.push("location = ").push_bind_unseparated(location.clone());
            }
        }
        query
            .push(" WHERE license_plate = ")
            .push_bind(plate.to_string())
            .push(" AND status = ")
            .push_bind(expected_status)
            .push(" RETURNING ")
            .push(CAR_COLUMNS);

        bounded(
            self.timeout,
            "update_car",
            query.build_query_as::<Car>().fetch_optional(&self.pool),
        )
        .await
    }

    /// Deletes a car while it still has `expected_status`.
    ///
    /// A car referenced by trips fails with `DbError::ForeignKeyViolation`.
    pub async fn delete(&self, plate: &str, expected_status: CarStatus) -> DbResult<Option<Car>> {
        debug!(plate = %plate, "Deleting car");

        let sql = format!(
            "DELETE FROM cars WHERE license_plate = ?1 AND status = ?2 RETURNING {CAR_COLUMNS}"
        );

        bounded(
            self.timeout,
            "delete_car",
            sqlx::query_as::<_, Car>(&sql)
                .bind(plate)
                .bind(expected_status)
                .fetch_optional(&self.pool),
        )
        .await
    }

    // =========================================================================
    // Rental path (coordinator only)
    // =========================================================================

    /// Reads a car inside an open transaction.
    pub(crate) async fn get_in(&self, conn: &mut SqliteConnection, plate: &str) -> DbResult<Option<Car>> {
        fetch_car(self.timeout, &mut *conn, plate).await
    }

    /// AVAILABLE → RENTED. Returns `false` if the car was not AVAILABLE
    /// (or does not exist), in which case nothing was written.
    pub(crate) async fn mark_rented(&self, conn: &mut SqliteConnection, plate: &str) -> DbResult<bool> {
        self.swap_status(conn, plate, CarStatus::Available, CarStatus::Rented)
            .await
    }

    /// RENTED → AVAILABLE. Returns `false` if the car was not RENTED.
    pub(crate) async fn mark_available(
        &self,
        conn: &mut SqliteConnection,
        plate: &str,
    ) -> DbResult<bool> {
        self.swap_status(conn, plate, CarStatus::Rented, CarStatus::Available)
            .await
    }

    /// Conditional `from -> to` update. Only pairs the transition table
    /// assigns to the rental path are accepted.
    async fn swap_status(
        &self,
        conn: &mut SqliteConnection,
        plate: &str,
        from: CarStatus,
        to: CarStatus,
    ) -> DbResult<bool> {
        if !from.allows_rental_swap(to) {
            return Err(DbError::Internal(format!(
                "{from} -> {to} is not a rental transition"
            )));
        }

        debug!(plate = %plate, from = %from, to = %to, "Swapping car status");

        let result = bounded(
            self.timeout,
            "swap_car_status",
            sqlx::query("UPDATE cars SET status = ?1 WHERE license_plate = ?2 AND status = ?3")
                .bind(to)
                .bind(plate)
                .bind(from)
                .execute(&mut *conn),
        )
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

async fn fetch_car<'e, E>(timeout: Duration, executor: E, plate: &str) -> DbResult<Option<Car>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {CAR_COLUMNS} FROM cars WHERE license_plate = ?1");
    bounded(
        timeout,
        "get_car",
        sqlx::query_as::<_, Car>(&sql)
            .bind(plate)
            .fetch_optional(executor),
    )
    .await
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use fleet_core::Rate;

    fn new_car(plate: &str, status: Option<CarStatus>) -> NewCar {
        NewCar {
            license_plate: plate.to_string(),
            make: "Toyota".to_string(),
            model: "Yaris".to_string(),
            cost_per_unit: "0.50".parse().unwrap(),
            location: "ATHENS".to_string(),
            status,
        }
    }

    async fn repo() -> (Database, CarRepository) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let cars = db.cars();
        (db, cars)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let (_db, cars) = repo().await;

        let car = cars.insert(&new_car("ABC1234", None)).await.unwrap();
        assert_eq!(car.status, CarStatus::Available);

        let fetched = cars.get_by_plate("ABC1234").await.unwrap().unwrap();
        assert_eq!(fetched, car);
        assert!(cars.get_by_plate("ZZZ9999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_plate_is_unique_violation() {
        let (_db, cars) = repo().await;
        cars.insert(&new_car("ABC1234", None)).await.unwrap();

        let err = cars.insert(&new_car("ABC1234", None)).await.unwrap_err();
        assert!(err.is_unique_violation_on("cars.license_plate"));
    }

    #[tokio::test]
    async fn test_list_counts_with_window_and_fallback() {
        let (_db, cars) = repo().await;
        for plate in ["AAA0001", "AAA0002", "AAA0003"] {
            cars.insert(&new_car(plate, None)).await.unwrap();
        }
        cars.insert(&new_car("MMM0001", Some(CarStatus::Maintenance)))
            .await
            .unwrap();

        let (page, total) = cars.list(None, 2, 0).await.unwrap();
        assert_eq!(total, 4);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].license_plate, "AAA0001");

        let (page, total) = cars.list(Some(CarStatus::Available), 2, 2).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);

        // Past the end: empty page, total still reported.
        let (page, total) = cars.list(Some(CarStatus::Available), 2, 10).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn test_sparse_update_only_touches_present_fields() {
        let (_db, cars) = repo().await;
        cars.insert(&new_car("ABC1234", None)).await.unwrap();

        let rate: Rate = "0.125".parse().unwrap();
        let patch = CarPatch::new().location("PATRAS").cost_per_unit(rate);
        let car = cars
            .update("ABC1234", CarStatus::Available, &patch)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(car.location, "PATRAS");
        assert_eq!(car.cost_per_unit, rate);
        assert_eq!(car.cost_per_unit.to_string(), "0.125");
        assert_eq!(car.make, "Toyota");
        assert_eq!(car.status, CarStatus::Available);
    }

    #[tokio::test]
    async fn test_update_guarded_by_expected_status() {
        let (_db, cars) = repo().await;
        cars.insert(&new_car("ABC1234", None)).await.unwrap();

        let patch = CarPatch::new().status(CarStatus::Maintenance);
        let stale = cars
            .update("ABC1234", CarStatus::Maintenance, &patch)
            .await
            .unwrap();
        assert!(stale.is_none());
    }

    #[tokio::test]
    async fn test_status_swaps_are_conditional() {
        let (db, cars) = repo().await;
        cars.insert(&new_car("ABC1234", None)).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        assert!(cars.mark_rented(&mut tx, "ABC1234").await.unwrap());
        assert!(!cars.mark_rented(&mut tx, "ABC1234").await.unwrap());
        assert!(cars.mark_available(&mut tx, "ABC1234").await.unwrap());
        assert!(!cars.mark_available(&mut tx, "ABC1234").await.unwrap());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_swaps_outside_the_rental_path_are_refused() {
        let (db, cars) = repo().await;
        cars.insert(&new_car("ABC1234", None)).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        let err = cars
            .swap_status(&mut tx, "ABC1234", CarStatus::Available, CarStatus::Maintenance)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Internal(_)));
        drop(tx);

        let car = cars.get_by_plate("ABC1234").await.unwrap().unwrap();
        assert_eq!(car.status, CarStatus::Available);
    }

    #[tokio::test]
    async fn test_sub_cent_rate_round_trips_through_text() {
        let (_db, cars) = repo().await;
        let mut car = new_car("ABC1234", None);
        car.cost_per_unit = "0.1250".parse().unwrap();
        cars.insert(&car).await.unwrap();

        let stored: String =
            sqlx::query_scalar("SELECT cost_per_unit FROM cars WHERE license_plate = 'ABC1234'")
                .fetch_one(&cars.pool)
                .await
                .unwrap();
        assert_eq!(stored, "0.125");

        let fetched = cars.get_by_plate("ABC1234").await.unwrap().unwrap();
        assert_eq!(fetched.cost_per_unit.per_unit(), rust_decimal::Decimal::new(125, 3));
    }

    #[tokio::test]
    async fn test_rolled_back_swap_leaves_car_available() {
        let (db, cars) = repo().await;
        cars.insert(&new_car("ABC1234", None)).await.unwrap();

        {
            let mut tx = db.pool().begin().await.unwrap();
            assert!(cars.mark_rented(&mut tx, "ABC1234").await.unwrap());
            // dropped without commit
        }

        let car = cars.get_by_plate("ABC1234").await.unwrap().unwrap();
        assert_eq!(car.status, CarStatus::Available);
    }
}
