//! # Fleet Engine
//!
//! Wires the database, the cache and the shared validator into the four
//! services callers use.
//!
//! ```text
//! FleetConfig ──► Fleet::connect
//!                   ├── Database (pool + migrations)
//!                   ├── Arc<dyn CacheStore> (Redis or in-process)
//!                   ├── Arc<RequestValidator>
//!                   │
//!                   ├── directory()      CarDirectory
//!                   ├── rentals()        RentalCoordinator
//!                   ├── users()          Users
//!                   └── subscriptions()  Subscriptions
//! ```

use fleet_cache::CacheStore;
use fleet_core::RequestValidator;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::FleetConfig;
use crate::directory::CarDirectory;
use crate::error::FleetResult;
use crate::pool::Database;
use crate::rental::RentalCoordinator;
use crate::subscriptions::Subscriptions;
use crate::users::Users;

/// Handle to the rental engine. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Fleet {
    db: Database,
    directory: CarDirectory,
    rentals: RentalCoordinator,
    users: Users,
    subscriptions: Subscriptions,
}

impl Fleet {
    /// Opens the database and the cache described by `config`.
    pub async fn connect(config: &FleetConfig) -> FleetResult<Self> {
        let db = Database::new(config.database.clone()).await?;
        let cache = config.cache.connect().await;
        info!(backend = cache.backend(), "Cache connected");

        let validator = Arc::new(RequestValidator::new(config.limits.clone()));
        Ok(Self::with_cache(db, cache, validator, config.cache.listing_ttl))
    }

    /// Builds the engine over existing handles.
    pub fn with_cache(
        db: Database,
        cache: Arc<dyn CacheStore>,
        validator: Arc<RequestValidator>,
        listing_ttl: Duration,
    ) -> Self {
        let directory = CarDirectory::new(db.cars(), cache, listing_ttl, validator.clone());
        let rentals = RentalCoordinator::new(db.clone(), directory.clone(), validator.clone());
        let users = Users::new(db.users(), validator.clone());
        let subscriptions = Subscriptions::new(db.clone(), validator);

        Fleet {
            db,
            directory,
            rentals,
            users,
            subscriptions,
        }
    }

    pub fn directory(&self) -> &CarDirectory {
        &self.directory
    }

    pub fn rentals(&self) -> &RentalCoordinator {
        &self.rentals
    }

    pub fn users(&self) -> &Users {
        &self.users
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}
