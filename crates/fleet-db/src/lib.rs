//! # fleet-db: Storage and Rental Transactions
//!
//! This crate owns every database operation of the rental engine and the
//! units of work that span several tables. It uses SQLite through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Fleet Rental Data Flow                           │
//! │                                                                         │
//! │  HTTP layer (authenticated email + decoded JSON)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     fleet-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌──────────────────┐   ┌──────────────┐  │   │
//! │  │   │ CarDirectory  │   │ RentalCoordinator│   │ Subscriptions│  │   │
//! │  │   │ cache-aside   │◄──│ start / stop     │   │ Users        │  │   │
//! │  │   └───────┬───────┘   └────────┬─────────┘   └──────┬───────┘  │   │
//! │  │           │                    │                    │          │   │
//! │  │   ┌───────▼────────────────────▼────────────────────▼───────┐  │   │
//! │  │   │  Repositories (cars, trips, payments, users, subs)      │  │   │
//! │  │   └───────────────────────────┬─────────────────────────────┘  │   │
//! │  └───────────────────────────────┼────────────────────────────────┘   │
//! │              │                   │                                     │
//! │              ▼                   ▼                                     │
//! │        fleet-cache            SQLite (WAL, foreign keys, migrations)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, statement timeouts, transactions
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - `DbError` and the engine-wide `FleetError`
//! - [`repository`] - One repository per table
//! - [`directory`] - Cars, direct edits, cached listings
//! - [`rental`] - StartTrip / StopTrip and trip reads
//! - [`subscriptions`] / [`users`] - Subscription gate and user records
//! - [`config`] / [`logging`] - Process startup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fleet_db::{Fleet, FleetConfig};
//!
//! fleet_db::logging::init_tracing();
//! let fleet = Fleet::connect(&FleetConfig::load()?).await?;
//!
//! let trip = fleet.rentals().start_trip("ann@example.com", "abc1234").await?;
//! let cars = fleet.directory().list(CarFilter::Available, 1, 20).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod logging;
pub mod migrations;
pub mod pool;
pub mod rental;
pub mod repository;
pub mod subscriptions;
pub mod users;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, FleetConfig};
pub use directory::CarDirectory;
pub use engine::Fleet;
pub use error::{DbError, DbResult, FleetError, FleetResult};
pub use pool::{Database, DbConfig};
pub use rental::RentalCoordinator;
pub use subscriptions::Subscriptions;
pub use users::Users;

// Repository re-exports for convenience
pub use repository::car::CarRepository;
pub use repository::payment::PaymentRepository;
pub use repository::subscription::SubscriptionRepository;
pub use repository::trip::TripRepository;
pub use repository::user::UserRepository;
