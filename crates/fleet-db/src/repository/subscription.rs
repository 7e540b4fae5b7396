//! # Subscription Repository
//!
//! Plans and user subscriptions. A subscription is active while it is not
//! cancelled and its end date lies after the instant being checked; the
//! instant is always supplied by the caller.

use chrono::{DateTime, Utc};
use fleet_core::{SubscriptionPlan, UserSubscription};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use std::time::Duration;
use tracing::debug;

use crate::error::DbResult;
use crate::pool::bounded;

/// Repository for subscription database operations.
#[derive(Debug, Clone)]
pub struct SubscriptionRepository {
    pool: SqlitePool,
    timeout: Duration,
}

impl SubscriptionRepository {
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        SubscriptionRepository { pool, timeout }
    }

    /// The user's active subscription at `now`, if any.
    pub async fn active(&self, email: &str, now: DateTime<Utc>) -> DbResult<Option<UserSubscription>> {
        fetch_active(self.timeout, &self.pool, email, now).await
    }

    /// Same as [`active`](Self::active), read inside an open transaction.
    pub(crate) async fn active_in(
        &self,
        conn: &mut SqliteConnection,
        email: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<UserSubscription>> {
        fetch_active(self.timeout, &mut *conn, email, now).await
    }

    /// All purchasable plans, cheapest per month first.
    pub async fn plans(&self) -> DbResult<Vec<SubscriptionPlan>> {
        bounded(
            self.timeout,
            "list_plans",
            sqlx::query_as::<_, SubscriptionPlan>(
                r#"
                SELECT tier, price_per_month_cents, description
                FROM subscription_plans
                ORDER BY price_per_month_cents
                "#,
            )
            .fetch_all(&self.pool),
        )
        .await
    }

    pub(crate) async fn insert(
        &self,
        conn: &mut SqliteConnection,
        subscription: &UserSubscription,
    ) -> DbResult<()> {
        debug!(
            id = %subscription.id,
            email = %subscription.user_email,
            tier = %subscription.tier,
            "Inserting subscription"
        );

        bounded(
            self.timeout,
            "insert_subscription",
            sqlx::query(
                r#"
                INSERT INTO user_subscriptions
                    (id, user_email, subscription_name, start_date, end_date, is_cancelled)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&subscription.id)
            .bind(&subscription.user_email)
            .bind(subscription.tier)
            .bind(subscription.start_date)
            .bind(subscription.end_date)
            .bind(subscription.is_cancelled)
            .execute(&mut *conn),
        )
        .await?;

        Ok(())
    }

    /// Cancels one subscription. Returns `false` if it was already cancelled.
    pub(crate) async fn cancel(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        debug!(id = %id, "Cancelling subscription");

        let result = bounded(
            self.timeout,
            "cancel_subscription",
            sqlx::query("UPDATE user_subscriptions SET is_cancelled = 1 WHERE id = ?1 AND is_cancelled = 0")
                .bind(id)
                .execute(&mut *conn),
        )
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

async fn fetch_active<'e, E>(
    timeout: Duration,
    executor: E,
    email: &str,
    now: DateTime<Utc>,
) -> DbResult<Option<UserSubscription>>
where
    E: Executor<'e, Database = Sqlite>,
{
    bounded(
        timeout,
        "get_active_subscription",
        sqlx::query_as::<_, UserSubscription>(
            r#"
            SELECT id, user_email, subscription_name AS tier,
                   start_date, end_date, is_cancelled
            FROM user_subscriptions
            WHERE user_email = ?1 AND is_cancelled = 0 AND end_date > ?2
            ORDER BY end_date DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(now)
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
    use chrono::Duration as ChronoDuration;
    use fleet_core::{NewUser, SubscriptionTier};

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.users()
            .insert_if_absent(
                &NewUser {
                    email: "ann@example.com".to_string(),
                    username: "ann".to_string(),
                    full_name: None,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        db
    }

    fn subscription(start: DateTime<Utc>, end: DateTime<Utc>) -> UserSubscription {
        UserSubscription {
            id: "sub-1".to_string(),
            user_email: "ann@example.com".to_string(),
            tier: SubscriptionTier::OneMonth,
            start_date: start,
            end_date: end,
            is_cancelled: false,
        }
    }

    #[tokio::test]
    async fn test_plans_are_seeded() {
        let db = setup().await;
        let plans = db.subscriptions().plans().await.unwrap();

        assert_eq!(plans.len(), 3);
        assert_eq!(plans[0].tier, SubscriptionTier::OneYear);
        assert_eq!(plans[2].price_per_month_cents, 2999);
    }

    #[tokio::test]
    async fn test_active_respects_end_date_and_cancellation() {
        let db = setup().await;
        let subs = db.subscriptions();
        let now = Utc::now();

        let mut tx = db.pool().begin().await.unwrap();
        subs.insert(&mut tx, &subscription(now - ChronoDuration::days(1), now + ChronoDuration::days(29)))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let active = subs.active("ann@example.com", now).await.unwrap().unwrap();
        assert_eq!(active.tier, SubscriptionTier::OneMonth);
        assert!(subs
            .active("ann@example.com", now + ChronoDuration::days(30))
            .await
            .unwrap()
            .is_none());

        let mut tx = db.pool().begin().await.unwrap();
        assert!(subs.cancel(&mut tx, "sub-1").await.unwrap());
        assert!(!subs.cancel(&mut tx, "sub-1").await.unwrap());
        tx.commit().await.unwrap();

        assert!(subs.active("ann@example.com", now).await.unwrap().is_none());
    }
}
