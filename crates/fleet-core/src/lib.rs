//! # fleet-core: Pure Rental Rules
//!
//! This crate holds every rule of the rental engine that can be expressed
//! without touching a database or a cache.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Fleet Rental Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                HTTP layer (auth, routing, JSON)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ verified email + decoded payload      │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        fleet-db: RentalCoordinator, CarDirectory, repos         │   │
//! │  └───────────────┬─────────────────────────────┬───────────────────┘   │
//! │                  │                             │                        │
//! │  ┌───────────────▼───────────────┐   ┌────────▼──────────────────┐    │
//! │  │  ★ fleet-core (THIS CRATE) ★  │   │  fleet-cache              │    │
//! │  │  types  money  behavior       │   │  Redis / in-process store │    │
//! │  │  validation  error            │   └───────────────────────────┘    │
//! │  │  NO I/O • PURE FUNCTIONS      │                                     │
//! │  └───────────────────────────────┘                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Car, Trip, Payment, status transition table)
//! - [`money`] - Integer-cent Money, decimal Rate and the fare calculation
//! - [`behavior`] - Running driving-behavior average
//! - [`validation`] - Request validation component
//! - [`error`] - Domain error types and the error taxonomy
//!
//! ## Example Usage
//!
//! ```rust
//! use fleet_core::money::{fare, Rate};
//! use rust_decimal::Decimal;
//!
//! // 10 units at 0.125/unit
//! let amount = fare(Decimal::new(10, 0), "0.125".parse::<Rate>().unwrap()).unwrap();
//! assert_eq!(amount.cents(), 125);
//!
//! // 10 units at 0.50/unit
//! let amount = fare(Decimal::new(10, 0), "0.50".parse::<Rate>().unwrap()).unwrap();
//! assert_eq!(amount.to_decimal(), Decimal::new(500, 2));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod behavior;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::{Money, Rate};
pub use types::*;
pub use validation::{RequestValidator, ValidationLimits};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default upper bound for a listing's page size.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Highest behavior score a single trip may report.
pub const MAX_BEHAVIOR_SCORE: f64 = 10.0;

/// Largest payment the ledger accepts: 99,999,999.99.
pub const MAX_PAYMENT_CENTS: i64 = 9_999_999_999;
