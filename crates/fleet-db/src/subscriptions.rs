//! # Subscriptions
//!
//! The subscription gate read by StopTrip, plus buying and cancelling.
//!
//! A subscription starts at UTC midnight of the day it is bought and runs
//! for its tier's number of calendar months. At most one non-cancelled,
//! non-expired subscription exists per user.

use chrono::{DateTime, Utc};
use fleet_core::{
    CoreError, RequestValidator, SubscriptionPlan, SubscriptionTier, UserSubscription,
    ValidationError,
};
use sqlx::SqliteConnection;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::FleetResult;
use crate::pool::Database;
use crate::repository::subscription::SubscriptionRepository;
use crate::repository::user::UserRepository;

#[derive(Debug, Clone)]
pub struct Subscriptions {
    db: Database,
    subscriptions: SubscriptionRepository,
    users: UserRepository,
    validator: Arc<RequestValidator>,
}

impl Subscriptions {
    pub fn new(db: Database, validator: Arc<RequestValidator>) -> Self {
        Subscriptions {
            subscriptions: db.subscriptions(),
            users: db.users(),
            db,
            validator,
        }
    }

    /// The user's active subscription right now.
    pub async fn get_active(&self, email: &str) -> FleetResult<UserSubscription> {
        let email = self.validator.email(email)?;
        self.subscriptions
            .active(&email, Utc::now())
            .await?
            .ok_or_else(|| CoreError::NoActiveSubscription { email }.into())
    }

    /// Purchasable plans.
    pub async fn plans(&self) -> FleetResult<Vec<SubscriptionPlan>> {
        Ok(self.subscriptions.plans().await?)
    }

    /// Buys a subscription of `tier`, starting today.
    pub async fn buy(&self, email: &str, tier: SubscriptionTier) -> FleetResult<UserSubscription> {
        let email = self.validator.email(email)?;
        if !self.users.exists(&email).await? {
            return Err(CoreError::UserNotFound(email).into());
        }

        let now = Utc::now();
        let start_date = start_of_day(now);
        let end_date = tier.ends_at(start_date).ok_or_else(|| ValidationError::InvalidFormat {
            field: "tier".to_string(),
            reason: "end date out of range".to_string(),
        })?;

        let subscription = UserSubscription {
            id: Uuid::new_v4().to_string(),
            user_email: email.clone(),
            tier,
            start_date,
            end_date,
            is_cancelled: false,
        };

        let mut tx = self.db.begin().await?;
        match self.insert_exclusive(&mut *tx, &subscription, now).await {
            Ok(()) => {
                self.db.commit(tx).await?;
                info!(
                    id = %subscription.id,
                    email = %email,
                    tier = %tier,
                    end_date = %subscription.end_date,
                    "Subscription bought"
                );
                Ok(subscription)
            }
            Err(e) => {
                warn!(email = %email, error = %e, "Subscription purchase rolled back");
                self.db.rollback(tx, "buy_subscription").await;
                Err(e)
            }
        }
    }

    async fn insert_exclusive(
        &self,
        conn: &mut SqliteConnection,
        subscription: &UserSubscription,
        now: DateTime<Utc>,
    ) -> FleetResult<()> {
        let email = &subscription.user_email;
        if self
            .subscriptions
            .active_in(&mut *conn, email, now)
            .await?
            .is_some()
        {
            return Err(CoreError::SubscriptionAlreadyActive {
                email: email.clone(),
            }
            .into());
        }

        self.subscriptions.insert(&mut *conn, subscription).await?;
        Ok(())
    }

    /// Cancels the user's active subscription.
    pub async fn cancel(&self, email: &str) -> FleetResult<UserSubscription> {
        let email = self.validator.email(email)?;
        let now = Utc::now();

        let mut tx = self.db.begin().await?;
        match self.cancel_active(&mut *tx, &email, now).await {
            Ok(cancelled) => {
                self.db.commit(tx).await?;
                info!(id = %cancelled.id, email = %email, "Subscription cancelled");
                Ok(cancelled)
            }
            Err(e) => {
                self.db.rollback(tx, "cancel_subscription").await;
                Err(e)
            }
        }
    }

    async fn cancel_active(
        &self,
        conn: &mut SqliteConnection,
        email: &str,
        now: DateTime<Utc>,
    ) -> FleetResult<UserSubscription> {
        let active = self
            .subscriptions
            .active_in(&mut *conn, email, now)
            .await?
            .ok_or_else(|| CoreError::NoActiveSubscription {
                email: email.to_string(),
            })?;

        if !self.subscriptions.cancel(&mut *conn, &active.id).await? {
            return Err(CoreError::NoActiveSubscription {
                email: email.to_string(),
            }
            .into());
        }

        Ok(UserSubscription {
            is_cancelled: true,
            ..active
        })
    }
}

/// UTC midnight of the day containing `instant`.
fn start_of_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(instant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_start_of_day_truncates_to_midnight() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 31, 17, 45, 12).unwrap();
        let midnight = start_of_day(instant);

        assert_eq!(midnight, Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap());
        assert_eq!(
            SubscriptionTier::OneMonth.ends_at(midnight),
            Some(Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap())
        );
    }
}
