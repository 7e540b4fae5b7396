//! # Error Types
//!
//! Domain-specific error types for fleet-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  fleet-core errors (this file)                                         │
//! │  ├── CoreError        - Rental rule violations                         │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── ErrorKind        - Five-way taxonomy the HTTP layer maps          │
//! │                                                                         │
//! │  fleet-cache errors                                                     │
//! │  └── CacheError       - Logged and swallowed, never surfaced           │
//! │                                                                         │
//! │  fleet-db errors                                                        │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── FleetError       - What every engine operation returns            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → FleetError → HTTP status code      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::types::CarStatus;

// =============================================================================
// Error Kind
// =============================================================================

/// The category every failure falls into.
///
/// The HTTP layer maps these to status codes:
///
/// | Kind               | Status |
/// |--------------------|--------|
/// | `NotFound`         | 404    |
/// | `Conflict`         | 409    |
/// | `InvalidState`     | 409    |
/// | `ValidationFailed` | 400    |
/// | `Internal`         | 500    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Car, trip, user or subscription absent.
    NotFound,
    /// Duplicate identity (license plate, email, active subscription).
    Conflict,
    /// Status transition disallowed, car unavailable.
    InvalidState,
    /// Malformed or inconsistent input.
    ValidationFailed,
    /// Storage failure.
    Internal,
}

// =============================================================================
// Core Error
// =============================================================================

/// Rental rule violations.
///
/// A `CoreError` always means the stored state is unchanged: the rule is
/// either checked before any write or the surrounding transaction is
/// rolled back.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Car not found: {0}")]
    CarNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Trip not found: {0}")]
    TripNotFound(String),

    /// The user has no open trip to stop.
    #[error("No active trip for {email}")]
    NoActiveTrip { email: String },

    #[error("No active subscription for {email}")]
    NoActiveSubscription { email: String },

    /// StartTrip on a car whose status is not AVAILABLE, or a car that was
    /// rented by a concurrent request between the read and the write.
    ///
    /// ## User Workflow
    /// ```text
    /// StartTrip(ABC1234)
    ///      │
    ///      ▼
    /// car.status == MAINTENANCE
    ///      │
    ///      ▼
    /// CarUnavailable { plate: "ABC1234", status: Maintenance }
    ///      │
    ///      ▼
    /// UI shows: "car is not available"
    /// ```
    #[error("Car {plate} is not available (currently {status})")]
    CarUnavailable { plate: String, status: CarStatus },

    /// A direct edit tried to move a car into or out of RENTED.
    #[error("Invalid status change for {plate}: {from} -> {to}")]
    InvalidStatusChange {
        plate: String,
        from: CarStatus,
        to: CarStatus,
    },

    /// Deleting a car that is out on a trip.
    #[error("Car {0} is rented and cannot be removed")]
    CarInUse(String),

    #[error("User {email} already has an active trip")]
    ActiveTripExists { email: String },

    #[error("Car with license plate '{0}' already exists")]
    DuplicateCar(String),

    /// Email or username already registered.
    #[error("User with {field} '{value}' already exists")]
    DuplicateUser { field: String, value: String },

    /// The car is referenced by completed trips and cannot be deleted.
    #[error("Car {0} has trip history and cannot be removed")]
    CarHasHistory(String),

    #[error("User {email} already has an active subscription")]
    SubscriptionAlreadyActive { email: String },

    /// The client-submitted amount differs from the server-side fare.
    #[error("inconsistent amount calculation: expected {expected}, got {supplied}")]
    AmountMismatch { expected: Decimal, supplied: Decimal },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns the taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::CarNotFound(_)
            | CoreError::UserNotFound(_)
            | CoreError::TripNotFound(_)
            | CoreError::NoActiveTrip { .. }
            | CoreError::NoActiveSubscription { .. } => ErrorKind::NotFound,

            CoreError::CarUnavailable { .. }
            | CoreError::InvalidStatusChange { .. }
            | CoreError::CarInUse(_)
            | CoreError::ActiveTripExists { .. } => ErrorKind::InvalidState,

            CoreError::DuplicateCar(_)
            | CoreError::DuplicateUser { .. }
            | CoreError::CarHasHistory(_)
            | CoreError::SubscriptionAlreadyActive { .. } => ErrorKind::Conflict,

            CoreError::AmountMismatch { .. } | CoreError::Validation(_) => {
                ErrorKind::ValidationFailed
            }
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when request input doesn't meet requirements.
/// Used for early validation before any database work runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: String,
        min: String,
        max: String,
    },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed plate, malformed email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
