//! # Domain Types
//!
//! Core domain types used throughout the rental engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Car        │   │      Trip       │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  license_plate  │◄──│  car_plate      │◄──│  trip_id        │       │
//! │  │  status         │   │  user_email     │   │  amount_cents   │       │
//! │  │  cost_per_unit  │   │  end_time?      │   │  method         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   CarStatus     │   │ PaymentMethod   │   │SubscriptionTier │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  AVAILABLE      │   │  SUBSCRIPTION   │   │  1_MONTH        │       │
//! │  │  RENTED         │   │  CARD           │   │  3_MONTHS       │       │
//! │  │  MAINTENANCE    │   │  CRYPTO         │   │  1_YEAR         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - `Car.status == Rented` exactly when one open trip references the car
//! - a trip is open while `end_time` is `None`; closing it is one-way
//! - one payment per closed trip, written in the same transaction

use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::{Money, Rate};

// =============================================================================
// Car Status
// =============================================================================

/// Availability state of a car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CarStatus {
    Available,
    Rented,
    Maintenance,
}

/// Which code path may perform a status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPath {
    /// The administrative edit API.
    Direct,
    /// Only the rental coordinator, inside a start/stop transaction.
    Rental,
}

/// Every allowed `(from, to)` pair and the path that owns it.
/// Pairs missing from the table are denied.
const TRANSITIONS: &[(CarStatus, CarStatus, TransitionPath)] = &[
    (CarStatus::Available, CarStatus::Maintenance, TransitionPath::Direct),
    (CarStatus::Maintenance, CarStatus::Available, TransitionPath::Direct),
    (CarStatus::Available, CarStatus::Rented, TransitionPath::Rental),
    (CarStatus::Rented, CarStatus::Available, TransitionPath::Rental),
];

impl CarStatus {
    /// Database/wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CarStatus::Available => "AVAILABLE",
            CarStatus::Rented => "RENTED",
            CarStatus::Maintenance => "MAINTENANCE",
        }
    }

    /// Looks up the path that owns the transition `self -> to`.
    pub fn transition_path(self, to: CarStatus) -> Option<TransitionPath> {
        TRANSITIONS
            .iter()
            .find(|(from, target, _)| *from == self && *target == to)
            .map(|(_, _, path)| *path)
    }

    /// Whether the rental coordinator may move a car from `self` to `to`.
    pub fn allows_rental_swap(self, to: CarStatus) -> bool {
        self.transition_path(to) == Some(TransitionPath::Rental)
    }

    /// Whether the administrative edit path may move a car from `self` to `to`.
    ///
    /// A rented car cannot be edited at all, and nothing may be edited into
    /// RENTED. Keeping the same non-rented status is a no-op and allowed.
    pub fn allows_direct_edit(self, to: CarStatus) -> bool {
        if self == CarStatus::Rented || to == CarStatus::Rented {
            return false;
        }
        self == to || self.transition_path(to) == Some(TransitionPath::Direct)
    }
}

impl fmt::Display for CarStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Car
// =============================================================================

/// A car in the fleet, keyed by its license plate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Car {
    /// Upper-case plate, 3 letters + 4 digits (e.g. `ABC1234`).
    pub license_plate: String,
    pub make: String,
    pub model: String,
    pub status: CarStatus,
    /// Price of one distance unit; may go below a cent.
    #[ts(as = "String")]
    pub cost_per_unit: Rate,
    /// Upper-case location label.
    pub location: String,
}

impl Car {
    /// Checks if the car can be rented right now.
    #[inline]
    pub fn is_available(&self) -> bool {
        self.status == CarStatus::Available
    }
}

/// Input for registering a car.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewCar {
    pub license_plate: String,
    pub make: String,
    pub model: String,
    #[ts(as = "String")]
    pub cost_per_unit: Rate,
    pub location: String,
    /// Initial status; `None` means AVAILABLE.
    #[serde(default)]
    pub status: Option<CarStatus>,
}

/// Sparse update of a car. Only fields that are `Some` are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CarPatch {
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub status: Option<CarStatus>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub cost_per_unit: Option<Rate>,
    #[serde(default)]
    pub location: Option<String>,
}

impl CarPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn make(mut self, make: impl Into<String>) -> Self {
        self.make = Some(make.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn status(mut self, status: CarStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn cost_per_unit(mut self, rate: Rate) -> Self {
        self.cost_per_unit = Some(rate);
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// True when no field would be written.
    pub fn is_empty(&self) -> bool {
        self.make.is_none()
            && self.model.is_none()
            && self.status.is_none()
            && self.cost_per_unit.is_none()
            && self.location.is_none()
    }
}

// =============================================================================
// Car Listing Filter
// =============================================================================

/// Which cars a paginated listing returns.
///
/// Each filter owns its own cache namespace, so a mutation only
/// invalidates the listings it can actually change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CarFilter {
    All,
    Available,
    Rented,
    Maintenance,
}

impl CarFilter {
    /// Short name used in cache keys.
    pub fn tag(&self) -> &'static str {
        match self {
            CarFilter::All => "all",
            CarFilter::Available => "available",
            CarFilter::Rented => "rented",
            CarFilter::Maintenance => "maintenance",
        }
    }

    /// The status this filter restricts to, if any.
    pub fn status(&self) -> Option<CarStatus> {
        match self {
            CarFilter::All => None,
            CarFilter::Available => Some(CarStatus::Available),
            CarFilter::Rented => Some(CarStatus::Rented),
            CarFilter::Maintenance => Some(CarStatus::Maintenance),
        }
    }

    pub fn for_status(status: CarStatus) -> CarFilter {
        match status {
            CarStatus::Available => CarFilter::Available,
            CarStatus::Rented => CarFilter::Rented,
            CarStatus::Maintenance => CarFilter::Maintenance,
        }
    }

    /// Filters whose listings change when a car with any of `statuses`
    /// is inserted, edited or removed. `All` is always included.
    pub fn affected_by(statuses: &[CarStatus]) -> Vec<CarFilter> {
        let mut filters = vec![CarFilter::All];
        for status in statuses {
            let filter = CarFilter::for_status(*status);
            if !filters.contains(&filter) {
                filters.push(filter);
            }
        }
        filters
    }
}

// =============================================================================
// Trip
// =============================================================================

/// A single rental session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Trip {
    /// Unique identifier (UUID v4).
    pub id: String,
    pub user_email: String,
    pub car_license_plate: String,
    #[ts(as = "String")]
    pub start_time: DateTime<Utc>,
    /// `None` while the trip is open.
    #[ts(as = "Option<String>")]
    pub end_time: Option<DateTime<Utc>>,
    pub driving_behavior: Option<f64>,
    pub distance: Option<f64>,
}

impl Trip {
    /// Checks if the trip has not been stopped yet.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// A trip row in a user's history, joined with its payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TripSummary {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub trip: Trip,
    /// `None` while the trip is open.
    pub amount_cents: Option<i64>,
    pub payment_method: Option<PaymentMethod>,
}

/// A single trip together with the rate of its car.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TripDetails {
    pub trip: Trip,
    #[ts(as = "String")]
    pub cost_per_unit: Rate,
}

/// The open trip of a user together with what StopTrip needs to bill it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ActiveTripCar {
    pub trip_id: String,
    pub car_license_plate: String,
    pub cost_per_unit: Rate,
}

/// Client payload for stopping a trip, after JSON decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StopTripRequest {
    #[ts(type = "string")]
    pub distance: Decimal,
    pub driving_behavior: f64,
    /// What the client computed; must equal the server-side fare.
    #[ts(type = "string")]
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
}

/// Outcome of a successful StopTrip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TripReceipt {
    pub trip: Trip,
    pub payment: Payment,
}

// =============================================================================
// Payment
// =============================================================================

/// Payment method for a completed trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Covered by an active subscription; always zero amount.
    Subscription,
    Card,
    Crypto,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Subscription => "SUBSCRIPTION",
            PaymentMethod::Card => "CARD",
            PaymentMethod::Crypto => "CRYPTO",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single payment recorded for a completed trip. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub trip_id: String,
    /// Amount charged in cents.
    pub amount_cents: i64,
    pub payment_method: PaymentMethod,
    #[ts(as = "String")]
    pub payment_time: DateTime<Utc>,
}

impl Payment {
    /// Returns the payment amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Users
// =============================================================================

/// Minimal user record owned by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// A user with the completed-trip count derived from the trip ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct UserProfile {
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    /// Running average; `None` until the first completed trip.
    pub driving_behavior: Option<f64>,
    pub completed_trips: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Subscriptions
// =============================================================================

/// Subscription length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum SubscriptionTier {
    #[serde(rename = "1_MONTH")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "1_MONTH"))]
    OneMonth,
    #[serde(rename = "3_MONTHS")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "3_MONTHS"))]
    ThreeMonths,
    #[serde(rename = "1_YEAR")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "1_YEAR"))]
    OneYear,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::OneMonth => "1_MONTH",
            SubscriptionTier::ThreeMonths => "3_MONTHS",
            SubscriptionTier::OneYear => "1_YEAR",
        }
    }

    pub fn months(&self) -> u32 {
        match self {
            SubscriptionTier::OneMonth => 1,
            SubscriptionTier::ThreeMonths => 3,
            SubscriptionTier::OneYear => 12,
        }
    }

    /// End of a subscription of this tier starting at `start`.
    /// `None` only if the date would overflow the calendar.
    pub fn ends_at(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        start.checked_add_months(Months::new(self.months()))
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's subscription. Active while not cancelled and not expired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct UserSubscription {
    pub id: String,
    pub user_email: String,
    pub tier: SubscriptionTier,
    #[ts(as = "String")]
    pub start_date: DateTime<Utc>,
    #[ts(as = "String")]
    pub end_date: DateTime<Utc>,
    pub is_cancelled: bool,
}

/// A purchasable subscription plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SubscriptionPlan {
    pub tier: SubscriptionTier,
    pub price_per_month_cents: i64,
    pub description: Option<String>,
}

// =============================================================================
// Pagination
// =============================================================================

/// One page of a listing plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: i64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    /// Number of pages needed for `total_count` rows.
    pub fn total_pages(&self) -> u32 {
        if self.page_size == 0 || self.total_count <= 0 {
            return 0;
        }
        let size = i64::from(self.page_size);
        ((self.total_count + size - 1) / size) as u32
    }
}

/// Row offset of a 1-based page.
pub fn page_offset(page: u32, page_size: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(page_size)
}

// =============================================================================
// Unit Tests
// =============================================================================
