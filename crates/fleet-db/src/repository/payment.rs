//! # Payment Repository
//!
//! Payments are append-only: one row per completed trip, written in the
//! same transaction that closes the trip. Triggers in the schema reject
//! any later UPDATE or DELETE.

use chrono::{DateTime, Utc};
use fleet_core::{Payment, PaymentMethod};
use sqlx::{SqliteConnection, SqlitePool};
use std::time::Duration;
use tracing::debug;

use crate::error::DbResult;
use crate::pool::bounded;

/// Repository for payment database operations.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
    timeout: Duration,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        PaymentRepository { pool, timeout }
    }

    /// The payment recorded for a trip, if it has been completed.
    pub async fn get_for_trip(&self, trip_id: &str) -> DbResult<Option<Payment>> {
        bounded(
            self.timeout,
            "get_payment",
            sqlx::query_as::<_, Payment>(
                r#"
                SELECT trip_id, amount_cents, payment_method, payment_time
                FROM payments
                WHERE trip_id = ?1
                "#,
            )
            .bind(trip_id)
            .fetch_optional(&self.pool),
        )
        .await
    }

    /// Records the payment of a trip being closed.
    pub(crate) async fn create(
        &self,
        conn: &mut SqliteConnection,
        trip_id: &str,
        amount_cents: i64,
        method: PaymentMethod,
        paid_at: DateTime<Utc>,
    ) -> DbResult<Payment> {
        debug!(trip_id = %trip_id, amount_cents, method = %method, "Recording payment");

        bounded(
            self.timeout,
            "create_payment",
            sqlx::query_as::<_, Payment>(
                r#"
                INSERT INTO payments (trip_id, amount_cents, payment_method, payment_time)
                VALUES (?1, ?2, ?3, ?4)
                RETURNING trip_id, amount_cents, payment_method, payment_time
                "#,
            )
            .bind(trip_id)
            .bind(amount_cents)
            .bind(method)
            .bind(paid_at)
            .fetch_one(&mut *conn),
        )
        .await
    }
}
