//! # User Repository
//!
//! The minimal user record the rental engine owns. Completed-trip counts
//! are derived from the trip ledger on read, never stored.

use chrono::{DateTime, Utc};
use fleet_core::{NewUser, UserProfile};
use sqlx::{SqliteConnection, SqlitePool};
use std::time::Duration;
use tracing::debug;

use crate::error::DbResult;
use crate::pool::bounded;

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
    timeout: Duration,
}

impl UserRepository {
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        UserRepository { pool, timeout }
    }

    /// Gets a user with the number of trips they have completed.
    pub async fn get_profile(&self, email: &str) -> DbResult<Option<UserProfile>> {
        bounded(
            self.timeout,
            "get_user",
            sqlx::query_as::<_, UserProfile>(
                r#"
                SELECT u.email, u.username, u.full_name, u.driving_behavior, u.created_at,
                       (SELECT COUNT(*) FROM trips t
                        WHERE t.user_email = u.email AND t.end_time IS NOT NULL) AS completed_trips
                FROM users u
                WHERE u.email = ?1
                "#,
            )
            .bind(email)
            .fetch_optional(&self.pool),
        )
        .await
    }

    pub async fn exists(&self, email: &str) -> DbResult<bool> {
        let found: Option<i64> = bounded(
            self.timeout,
            "user_exists",
            sqlx::query_scalar::<_, i64>("SELECT 1 FROM users WHERE email = ?1")
                .bind(email)
                .fetch_optional(&self.pool),
        )
        .await?;

        Ok(found.is_some())
    }

    /// Inserts a user unless the email is already registered.
    ///
    /// ## Returns
    /// `true` if a row was written. A username taken by a different email
    /// fails with a unique violation on `users.username`.
    pub async fn insert_if_absent(&self, user: &NewUser, created_at: DateTime<Utc>) -> DbResult<bool> {
        debug!(email = %user.email, username = %user.username, "Ensuring user");

        let result = bounded(
            self.timeout,
            "insert_user",
            sqlx::query(
                r#"
                INSERT INTO users (email, username, full_name, created_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(email) DO NOTHING
                "#,
            )
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.full_name)
            .bind(created_at)
            .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Transactional (coordinator only)
    // =========================================================================

    /// Reads the stored behavior average.
    ///
    /// ## Returns
    /// * `Ok(None)` - No such user
    /// * `Ok(Some(None))` - User has no completed trips yet
    pub(crate) async fn driving_behavior_in(
        &self,
        conn: &mut SqliteConnection,
        email: &str,
    ) -> DbResult<Option<Option<f64>>> {
        bounded(
            self.timeout,
            "get_driving_behavior",
            sqlx::query_scalar::<_, Option<f64>>("SELECT driving_behavior FROM users WHERE email = ?1")
                .bind(email)
                .fetch_optional(&mut *conn),
        )
        .await
    }

    /// Overwrites the behavior average. Returns `false` if the user is gone.
    pub(crate) async fn set_driving_behavior(
        &self,
        conn: &mut SqliteConnection,
        email: &str,
        average: f64,
    ) -> DbResult<bool> {
        debug!(email = %email, average, "Updating driving behavior");

        let result = bounded(
            self.timeout,
            "set_driving_behavior",
            sqlx::query("UPDATE users SET driving_behavior = ?2 WHERE email = ?1")
                .bind(email)
                .bind(average)
                .execute(&mut *conn),
        )
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            username: username.to_string(),
            full_name: None,
        }
    }

    #[tokio::test]
    async fn test_insert_is_idempotent_per_email() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let users = db.users();

        assert!(users.insert_if_absent(&user("ann@example.com", "ann"), Utc::now()).await.unwrap());
        assert!(!users.insert_if_absent(&user("ann@example.com", "ann"), Utc::now()).await.unwrap());

        let profile = users.get_profile("ann@example.com").await.unwrap().unwrap();
        assert_eq!(profile.username, "ann");
        assert_eq!(profile.completed_trips, 0);
        assert!(profile.driving_behavior.is_none());
    }

    #[tokio::test]
    async fn test_username_taken_by_other_email() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let users = db.users();

        users.insert_if_absent(&user("ann@example.com", "ann"), Utc::now()).await.unwrap();
        let err = users
            .insert_if_absent(&user("other@example.com", "ann"), Utc::now())
            .await
            .unwrap_err();

        assert!(err.is_unique_violation_on("users.username"));
    }

    #[tokio::test]
    async fn test_behavior_read_distinguishes_missing_user() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let users = db.users();
        users.insert_if_absent(&user("ann@example.com", "ann"), Utc::now()).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        assert_eq!(users.driving_behavior_in(&mut tx, "ann@example.com").await.unwrap(), Some(None));
        assert_eq!(users.driving_behavior_in(&mut tx, "nobody@example.com").await.unwrap(), None);

        assert!(users.set_driving_behavior(&mut tx, "ann@example.com", 7.5).await.unwrap());
        assert_eq!(
            users.driving_behavior_in(&mut tx, "ann@example.com").await.unwrap(),
            Some(Some(7.5))
        );
        tx.commit().await.unwrap();
    }
}
