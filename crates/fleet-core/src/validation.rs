//! # Validation Module
//!
//! Input validation for the rental engine.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP layer                                                   │
//! │  └── JSON shape, authenticated email                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: RequestValidator (THIS MODULE)                               │
//! │  ├── plate/email format, paging bounds                                 │
//! │  └── stop-trip payload ranges                                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints (status, positive rate)                         │
//! │  ├── UNIQUE / partial unique indexes (one open trip per car/user)      │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! The validator is built once at startup and shared:
//! ```rust
//! use std::sync::Arc;
//! use fleet_core::validation::{RequestValidator, ValidationLimits};
//!
//! let validator = Arc::new(RequestValidator::new(ValidationLimits::default()));
//! assert_eq!(validator.license_plate(" abc1234 ").unwrap(), "ABC1234");
//! ```

use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::money::{Money, Rate};
use crate::types::{CarPatch, CarStatus, NewCar, NewUser, StopTripRequest};
use crate::{MAX_BEHAVIOR_SCORE, MAX_PAGE_SIZE, MAX_PAYMENT_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest email/username the users table accepts.
const MAX_IDENTITY_LEN: usize = 45;

/// Longest make/model/location label.
const MAX_LABEL_LEN: usize = 100;

// =============================================================================
// Free Validators
// =============================================================================

/// Normalizes a license plate to upper case and checks its shape.
///
/// ## Rules
/// - exactly 7 characters after trimming
/// - 3 ASCII letters followed by 4 ASCII digits
///
/// ## Example
/// ```rust
/// use fleet_core::validation::normalize_license_plate;
///
/// assert_eq!(normalize_license_plate("abc1234").unwrap(), "ABC1234");
/// assert!(normalize_license_plate("AB12345").is_err());
/// assert!(normalize_license_plate("ABC12345").is_err());
/// ```
pub fn normalize_license_plate(raw: &str) -> ValidationResult<String> {
    let plate = raw.trim();

    if plate.is_empty() {
        return Err(required("license_plate"));
    }

    let bytes = plate.as_bytes();
    let well_formed = bytes.len() == 7
        && bytes[..3].iter().all(u8::is_ascii_alphabetic)
        && bytes[3..].iter().all(u8::is_ascii_digit);

    if !well_formed {
        return Err(ValidationError::InvalidFormat {
            field: "license_plate".to_string(),
            reason: "expected 3 letters followed by 4 digits".to_string(),
        });
    }

    Ok(plate.to_ascii_uppercase())
}

/// Checks an email address and returns it trimmed.
///
/// This is a shape check only; ownership of the address is the auth
/// layer's concern.
pub fn validate_email(raw: &str) -> ValidationResult<String> {
    let email = raw.trim();

    if email.is_empty() {
        return Err(required("email"));
    }

    if email.len() > MAX_IDENTITY_LEN {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: MAX_IDENTITY_LEN,
        });
    }

    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: reason.to_string(),
    };

    if email.chars().any(char::is_whitespace) {
        return Err(invalid("must not contain whitespace"));
    }

    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| invalid("missing '@'"))?;

    if local.is_empty() || domain.contains('@') {
        return Err(invalid("malformed local part"));
    }

    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid("malformed domain"));
    }

    Ok(email.to_string())
}

/// Checks a required free-text label and returns it trimmed.
pub fn validate_label(field: &str, raw: &str, max: usize) -> ValidationResult<String> {
    let value = raw.trim();

    if value.is_empty() {
        return Err(required(field));
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value.to_string())
}

/// Validates a distance rate: positive, at most [`Rate::MAX_SCALE`]
/// fractional digits.
///
/// ## Example
/// ```rust
/// use fleet_core::money::Rate;
/// use fleet_core::validation::validate_rate;
///
/// assert!(validate_rate("0.125".parse::<Rate>().unwrap()).is_ok());
/// assert!(validate_rate("0".parse::<Rate>().unwrap()).is_err());
/// assert!(validate_rate("0.0000001".parse::<Rate>().unwrap()).is_err());
/// ```
pub fn validate_rate(rate: Rate) -> ValidationResult<()> {
    if rate.per_unit() <= Decimal::ZERO {
        return Err(ValidationError::MustBePositive {
            field: "cost_per_unit".to_string(),
        });
    }
    if rate.per_unit().scale() > Rate::MAX_SCALE {
        return Err(ValidationError::InvalidFormat {
            field: "cost_per_unit".to_string(),
            reason: format!("at most {} decimal places", Rate::MAX_SCALE),
        });
    }
    Ok(())
}

fn required(field: &str) -> ValidationError {
    ValidationError::Required {
        field: field.to_string(),
    }
}

// =============================================================================
// Request Validator
// =============================================================================

/// Bounds applied to incoming requests.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationLimits {
    /// Largest page a listing may request.
    pub max_page_size: u32,
    /// Upper bound of a trip's behavior score (lower bound is exclusive 0).
    pub max_behavior: f64,
    /// Largest payment amount in cents.
    pub max_amount_cents: i64,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        ValidationLimits {
            max_page_size: MAX_PAGE_SIZE,
            max_behavior: MAX_BEHAVIOR_SCORE,
            max_amount_cents: MAX_PAYMENT_CENTS,
        }
    }
}

impl ValidationLimits {
    pub fn max_page_size(mut self, max: u32) -> Self {
        self.max_page_size = max;
        self
    }
}

/// Validates and normalizes requests before they reach storage.
///
/// Constructed once from [`ValidationLimits`] and shared by the car
/// directory and the rental coordinator.
#[derive(Debug, Clone, Default)]
pub struct RequestValidator {
    limits: ValidationLimits,
}

impl RequestValidator {
    pub fn new(limits: ValidationLimits) -> Self {
        RequestValidator { limits }
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    pub fn license_plate(&self, raw: &str) -> ValidationResult<String> {
        normalize_license_plate(raw)
    }

    pub fn email(&self, raw: &str) -> ValidationResult<String> {
        validate_email(raw)
    }

    /// Checks 1-based paging parameters.
    ///
    /// ## Example
    /// ```rust
    /// use fleet_core::validation::RequestValidator;
    ///
    /// let validator = RequestValidator::default();
    /// assert!(validator.paging(1, 10).is_ok());
    /// assert!(validator.paging(0, 10).is_err());
    /// assert!(validator.paging(1, 1000).is_err());
    /// ```
    pub fn paging(&self, page: u32, page_size: u32) -> ValidationResult<()> {
        if page == 0 {
            return Err(ValidationError::MustBePositive {
                field: "page".to_string(),
            });
        }

        if page_size == 0 || page_size > self.limits.max_page_size {
            return Err(ValidationError::OutOfRange {
                field: "page_size".to_string(),
                min: "1".to_string(),
                max: self.limits.max_page_size.to_string(),
            });
        }

        Ok(())
    }

    /// Range checks on a stop-trip payload.
    ///
    /// ## Rules
    /// - `distance > 0`
    /// - `0 < driving_behavior <= max_behavior`
    /// - `0 <= amount <= max_amount`
    pub fn stop_trip(&self, request: &StopTripRequest) -> ValidationResult<()> {
        if request.distance <= Decimal::ZERO {
            return Err(ValidationError::MustBePositive {
                field: "distance".to_string(),
            });
        }

        let behavior = request.driving_behavior;
        if !behavior.is_finite() || behavior <= 0.0 || behavior > self.limits.max_behavior {
            return Err(ValidationError::OutOfRange {
                field: "driving_behavior".to_string(),
                min: "0 (exclusive)".to_string(),
                max: self.limits.max_behavior.to_string(),
            });
        }

        let max_amount = Money::from_cents(self.limits.max_amount_cents).to_decimal();
        if request.amount < Decimal::ZERO || request.amount > max_amount {
            return Err(ValidationError::OutOfRange {
                field: "amount".to_string(),
                min: "0".to_string(),
                max: max_amount.to_string(),
            });
        }

        Ok(())
    }

    /// Validates a car registration and returns it normalized
    /// (plate and location upper-cased, labels trimmed).
    pub fn new_car(&self, car: NewCar) -> ValidationResult<NewCar> {
        let license_plate = self.license_plate(&car.license_plate)?;
        let make = validate_label("make", &car.make, MAX_LABEL_LEN)?;
        let model = validate_label("model", &car.model, MAX_LABEL_LEN)?;
        let location = validate_label("location", &car.location, MAX_LABEL_LEN)?.to_uppercase();
        validate_rate(car.cost_per_unit)?;

        if car.status == Some(CarStatus::Rented) {
            return Err(ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: vec![
                    CarStatus::Available.to_string(),
                    CarStatus::Maintenance.to_string(),
                ],
            });
        }

        Ok(NewCar {
            license_plate,
            make,
            model,
            cost_per_unit: car.cost_per_unit,
            location,
            status: car.status,
        })
    }

    /// Validates the present fields of a sparse car update.
    ///
    /// Status rules are not checked here; they depend on the car's current
    /// status and are enforced by the directory.
    pub fn car_patch(&self, patch: CarPatch) -> ValidationResult<CarPatch> {
        if patch.is_empty() {
            return Err(required("at least one field"));
        }

        let make = patch
            .make
            .as_deref()
            .map(|v| validate_label("make", v, MAX_LABEL_LEN))
            .transpose()?;
        let model = patch
            .model
            .as_deref()
            .map(|v| validate_label("model", v, MAX_LABEL_LEN))
            .transpose()?;
        let location = patch
            .location
            .as_deref()
            .map(|v| validate_label("location", v, MAX_LABEL_LEN).map(|l| l.to_uppercase()))
            .transpose()?;
        if let Some(rate) = patch.cost_per_unit {
            validate_rate(rate)?;
        }

        Ok(CarPatch {
            make,
            model,
            status: patch.status,
            cost_per_unit: patch.cost_per_unit,
            location,
        })
    }

    pub fn new_user(&self, user: NewUser) -> ValidationResult<NewUser> {
        let email = self.email(&user.email)?;
        let username = validate_label("username", &user.username, MAX_IDENTITY_LEN)?;
        let full_name = user
            .full_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| validate_label("full_name", name, MAX_IDENTITY_LEN))
            .transpose()?;

        Ok(NewUser {
            email,
            username,
            full_name,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentMethod;

    fn stop(distance: Decimal, behavior: f64, amount: Decimal) -> StopTripRequest {
        StopTripRequest {
            distance,
            driving_behavior: behavior,
            amount,
            payment_method: PaymentMethod::Card,
        }
    }

    fn new_car(plate: &str) -> NewCar {
        NewCar {
            license_plate: plate.to_string(),
            make: " Toyota ".to_string(),
            model: "Yaris".to_string(),
            cost_per_unit: Rate::new(Decimal::new(50, 2)),
            location: "athens".to_string(),
            status: None,
        }
    }

    #[test]
    fn test_license_plate() {
        assert_eq!(normalize_license_plate("xyz0001").unwrap(), "XYZ0001");
        assert!(matches!(
            normalize_license_plate("   "),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            normalize_license_plate("1234ABC"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(normalize_license_plate("ÄBC1234").is_err());
    }

    #[test]
    fn test_email() {
        assert_eq!(validate_email(" rider@example.com ").unwrap(), "rider@example.com");
        assert!(validate_email("rider.example.com").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("rider@example").is_err());
        assert!(validate_email("ri der@example.com").is_err());
        assert!(validate_email(&format!("{}@example.com", "a".repeat(40))).is_err());
    }

    #[test]
    fn test_paging_respects_limits() {
        let validator = RequestValidator::new(ValidationLimits::default().max_page_size(20));
        assert!(validator.paging(3, 20).is_ok());
        assert!(matches!(
            validator.paging(1, 21),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(validator.paging(1, 0).is_err());
    }

    #[test]
    fn test_stop_trip_ranges() {
        let validator = RequestValidator::default();
        let ten = Decimal::new(10, 0);
        let five = Decimal::new(500, 2);

        assert!(validator.stop_trip(&stop(ten, 0.8, five)).is_ok());
        assert!(validator.stop_trip(&stop(ten, 10.0, Decimal::ZERO)).is_ok());

        assert!(validator.stop_trip(&stop(Decimal::ZERO, 0.8, five)).is_err());
        assert!(validator.stop_trip(&stop(ten, 0.0, five)).is_err());
        assert!(validator.stop_trip(&stop(ten, 10.5, five)).is_err());
        assert!(validator.stop_trip(&stop(ten, f64::NAN, five)).is_err());
        assert!(validator.stop_trip(&stop(ten, 0.8, Decimal::new(-1, 2))).is_err());
        assert!(validator
            .stop_trip(&stop(ten, 0.8, Decimal::new(10_000_000_000, 2)))
            .is_err());
    }

    #[test]
    fn test_new_car_is_normalized() {
        let validator = RequestValidator::default();
        let car = validator.new_car(new_car("abc1234")).unwrap();
        assert_eq!(car.license_plate, "ABC1234");
        assert_eq!(car.make, "Toyota");
        assert_eq!(car.location, "ATHENS");
    }

    #[test]
    fn test_new_car_rejects_rented_and_bad_rate() {
        let validator = RequestValidator::default();

        let mut car = new_car("ABC1234");
        car.status = Some(CarStatus::Rented);
        assert!(matches!(
            validator.new_car(car),
            Err(ValidationError::NotAllowed { .. })
        ));

        let mut car = new_car("ABC1234");
        car.cost_per_unit = Rate::new(Decimal::ZERO);
        assert!(matches!(
            validator.new_car(car),
            Err(ValidationError::MustBePositive { .. })
        ));

        let mut car = new_car("ABC1234");
        car.cost_per_unit = Rate::new(Decimal::new(1, 7));
        assert!(matches!(
            validator.new_car(car),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_new_car_keeps_sub_cent_rate() {
        let mut car = new_car("ABC1234");
        car.cost_per_unit = Rate::new(Decimal::new(125, 3));

        let car = RequestValidator::default().new_car(car).unwrap();
        assert_eq!(car.cost_per_unit.per_unit(), Decimal::new(125, 3));
    }

    #[test]
    fn test_car_patch() {
        let validator = RequestValidator::default();
        assert!(validator.car_patch(CarPatch::new()).is_err());

        let patch = validator
            .car_patch(CarPatch::new().location(" thessaloniki "))
            .unwrap();
        assert_eq!(patch.location.as_deref(), Some("THESSALONIKI"));

        assert!(validator.car_patch(CarPatch::new().make("  ")).is_err());
        assert!(validator
            .car_patch(CarPatch::new().cost_per_unit(Rate::new(Decimal::new(-5, 2))))
            .is_err());
    }

    #[test]
    fn test_new_user_drops_blank_full_name() {
        let validator = RequestValidator::default();
        let user = validator
            .new_user(NewUser {
                email: "rider@example.com".to_string(),
                username: "rider".to_string(),
                full_name: Some("   ".to_string()),
            })
            .unwrap();
        assert_eq!(user.full_name, None);
    }
}
