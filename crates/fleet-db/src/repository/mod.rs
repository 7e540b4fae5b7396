//! # Repository Module
//!
//! SQL for each table, and nothing else.
//!
//! ## Layering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Services over Repositories                           │
//! │                                                                         │
//! │  CarDirectory / RentalCoordinator / Subscriptions / Users              │
//! │       │   (validation, rules, transactions, cache invalidation)        │
//! │       ▼                                                                 │
//! │  CarRepository · TripRepository · PaymentRepository                    │
//! │  UserRepository · SubscriptionRepository                               │
//! │       │   (one statement per call, bounded by the statement timeout)   │
//! │       ▼                                                                 │
//! │  SQLite                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pool-backed methods are public. Methods taking `&mut SqliteConnection`
//! are crate-private and meant to run inside a service's transaction.
//!
//! ## Available Repositories
//!
//! - [`CarRepository`](car::CarRepository) - Car CRUD, listings, status swaps
//! - [`TripRepository`](trip::TripRepository) - Open/close trips, history
//! - [`PaymentRepository`](payment::PaymentRepository) - Append-only payments
//! - [`UserRepository`](user::UserRepository) - Users and behavior averages
//! - [`SubscriptionRepository`](subscription::SubscriptionRepository) - Plans and subscriptions

pub mod car;
pub mod payment;
pub mod subscription;
pub mod trip;
pub mod user;
