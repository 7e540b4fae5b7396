//! # Money Module
//!
//! Provides the `Money` and `Rate` types and the trip fare calculation.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    10.1 km × 0.35/km = 3.5349999999999997  → rounds to 3.53  ❌         │
//! │                                                                         │
//! │  OUR SOLUTION: decimals in, integer cents out                           │
//! │    Decimal(10.1) × Decimal(0.35) = 3.535   → rounds to 3.54  ✓         │
//! │    stored as 354 cents                                                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Client payloads carry decimals (`distance`, `amount`), and so does a
//! car's [`Rate`], which may go below a cent (`0.125` per unit). The fare is
//! computed in `rust_decimal`, rounded once, and stored as cents.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in cents.
///
/// ## Where Money is Used
/// ```text
/// Car.cost_per_unit (Rate) ──► fare(distance, rate) ──► Payment.amount_cents
///                                     ▲
///                                     │ compared with
///                         StopTripRequest.amount (client decimal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use fleet_core::money::Money;
    ///
    /// let amount = Money::from_cents(354);
    /// assert_eq!(amount.to_string(), "3.54");
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Converts to a decimal with two fractional digits.
    ///
    /// ## Example
    /// ```rust
    /// use fleet_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// assert_eq!(Money::from_cents(500).to_decimal(), Decimal::new(500, 2));
    /// ```
    #[inline]
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.dollars().abs(), self.cents_part())
    }
}

// =============================================================================
// Rate Type
// =============================================================================

/// Price of one distance unit.
///
/// Kept as an exact decimal, normalized (`0.50` is stored as `0.5`), and
/// written to SQLite as TEXT. Positivity and precision are checked by
/// [`validate_rate`](crate::validation::validate_rate), not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate(Decimal);

impl Rate {
    /// Most fractional digits a rate may carry.
    pub const MAX_SCALE: u32 = 6;

    pub fn new(per_unit: Decimal) -> Self {
        Rate(per_unit.normalize())
    }

    #[inline]
    pub fn per_unit(&self) -> Decimal {
        self.0
    }
}

impl FromStr for Rate {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Rate::new)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(feature = "sqlx")]
mod rate_sqlx {
    use super::Rate;
    use sqlx::encode::IsNull;
    use sqlx::error::BoxDynError;
    use sqlx::sqlite::{Sqlite, SqliteArgumentValue, SqliteTypeInfo, SqliteValueRef};
    use sqlx::{Decode, Encode, Type};

    impl Type<Sqlite> for Rate {
        fn type_info() -> SqliteTypeInfo {
            <String as Type<Sqlite>>::type_info()
        }

        fn compatible(ty: &SqliteTypeInfo) -> bool {
            <String as Type<Sqlite>>::compatible(ty)
        }
    }

    impl<'q> Encode<'q, Sqlite> for Rate {
        fn encode_by_ref(
            &self,
            buf: &mut Vec<SqliteArgumentValue<'q>>,
        ) -> Result<IsNull, BoxDynError> {
            <String as Encode<'q, Sqlite>>::encode(self.to_string(), buf)
        }
    }

    impl<'r> Decode<'r, Sqlite> for Rate {
        fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
            let text = <&str as Decode<'r, Sqlite>>::decode(value)?;
            Ok(text.parse::<Rate>()?)
        }
    }
}

// =============================================================================
// Fare Calculation
// =============================================================================

/// Computes `round(distance × rate, 2)`, rounding halves away from zero.
///
/// The product is exact; sub-cent rates only meet rounding once, here.
/// Returns `None` on overflow.
///
/// ## Example
/// ```rust
/// use fleet_core::money::{fare, Rate};
/// use rust_decimal::Decimal;
///
/// // 10 units at 0.50/unit
/// let amount = fare(Decimal::new(10, 0), Rate::new(Decimal::new(50, 2))).unwrap();
/// assert_eq!(amount.cents(), 500);
///
/// // 10.1 units at 0.35/unit = 3.535 → 3.54
/// let amount = fare(Decimal::new(101, 1), Rate::new(Decimal::new(35, 2))).unwrap();
/// assert_eq!(amount.cents(), 354);
/// ```
pub fn fare(distance: Decimal, rate: Rate) -> Option<Money> {
    let amount = distance.checked_mul(rate.per_unit())?;
    amount
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .checked_mul(Decimal::ONE_HUNDRED)?
        .to_i64()
        .map(Money)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rate(s: &str) -> Rate {
        s.parse().unwrap()
    }

    #[test]
    fn test_fare_exact() {
        let amount = fare(Decimal::new(10, 0), rate("0.50")).unwrap();
        assert_eq!(amount, Money::from_cents(500));
        assert_eq!(amount.to_decimal(), Decimal::new(500, 2));
    }

    #[test]
    fn test_fare_rounds_half_away_from_zero() {
        // 0.125 × 1.00 = 0.125 → 0.13 (banker's rounding would give 0.12)
        let amount = fare(Decimal::new(125, 3), rate("1")).unwrap();
        assert_eq!(amount.cents(), 13);

        let amount = fare(Decimal::new(135, 3), rate("1.00")).unwrap();
        assert_eq!(amount.cents(), 14);

        // 0.124 × 1.00 → 0.12
        let amount = fare(Decimal::new(124, 3), rate("1")).unwrap();
        assert_eq!(amount.cents(), 12);
    }

    #[test]
    fn test_fare_with_sub_cent_rate() {
        // 10 × 0.125 = 1.25 exactly
        assert_eq!(fare(Decimal::new(10, 0), rate("0.125")).unwrap().cents(), 125);
        // 3 × 0.125 = 0.375 → 0.38
        assert_eq!(fare(Decimal::new(3, 0), rate("0.125")).unwrap().cents(), 38);
        // 1 × 0.004 = 0.004 → 0.00
        assert_eq!(fare(Decimal::ONE, rate("0.004")).unwrap().cents(), 0);
    }

    #[test]
    fn test_fare_overflow() {
        assert_eq!(fare(Decimal::MAX, Rate::new(Decimal::MAX)), None);
    }

    #[test]
    fn test_rate_is_normalized() {
        assert_eq!(rate("0.50"), rate("0.5"));
        assert_eq!(rate(" 0.50 ").to_string(), "0.5");
        assert_eq!(rate("0.125").per_unit(), Decimal::new(125, 3));
        assert!("abc".parse::<Rate>().is_err());
    }

    #[test]
    fn test_rate_wire_format() {
        assert_eq!(serde_json::to_string(&rate("0.125")).unwrap(), "\"0.125\"");
        let decoded: Rate = serde_json::from_str("\"0.35\"").unwrap();
        assert_eq!(decoded, rate("0.35"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(7).to_string(), "0.07");
        assert_eq!(Money::from_cents(-1250).to_string(), "-12.50");
    }
}
