//! # Users
//!
//! The minimal user record the engine needs. Credentials and sessions are
//! owned by the auth layer; the engine only learns emails it is handed.

use chrono::Utc;
use fleet_core::{CoreError, NewUser, RequestValidator, UserProfile};
use std::sync::Arc;
use tracing::info;

use crate::error::{FleetError, FleetResult};
use crate::repository::user::UserRepository;

#[derive(Debug, Clone)]
pub struct Users {
    users: UserRepository,
    validator: Arc<RequestValidator>,
}

impl Users {
    pub fn new(users: UserRepository, validator: Arc<RequestValidator>) -> Self {
        Users { users, validator }
    }

    /// Creates the user unless the email is already known, then returns
    /// the stored profile. A username held by another email is a conflict.
    pub async fn ensure_user(&self, user: NewUser) -> FleetResult<UserProfile> {
        let user = self.validator.new_user(user)?;

        let created = self
            .users
            .insert_if_absent(&user, Utc::now())
            .await
            .map_err(|e| {
                if e.is_unique_violation_on("users.username") {
                    FleetError::from(CoreError::DuplicateUser {
                        field: "username".to_string(),
                        value: user.username.clone(),
                    })
                } else {
                    e.into()
                }
            })?;

        if created {
            info!(email = %user.email, username = %user.username, "User created");
        }

        self.load(&user.email).await
    }

    /// A user with their behavior average and completed-trip count.
    pub async fn get_user(&self, email: &str) -> FleetResult<UserProfile> {
        let email = self.validator.email(email)?;
        self.load(&email).await
    }

    async fn load(&self, email: &str) -> FleetResult<UserProfile> {
        self.users
            .get_profile(email)
            .await?
            .ok_or_else(|| CoreError::UserNotFound(email.to_string()).into())
    }
}
