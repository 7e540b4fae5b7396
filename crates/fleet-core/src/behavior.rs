//! # Driving-Behavior Aggregation
//!
//! Incremental running average of a user's per-trip behavior scores.
//!
//! ```text
//! completed trips:  v1   v2   v3   ...  vN   vN+1 (closing now)
//!                   └──────── avg_N ──────┘
//!
//! avg_N+1 = (avg_N × N + vN+1) / (N + 1)
//! ```
//!
//! `N` is recounted from the trip ledger on every update rather than stored,
//! so the stored average can never drift from the number of trips it covers.

/// Folds `new_value` into the current average of `completed` prior trips.
///
/// With no prior average the new value becomes the average.
///
/// ## Example
/// ```rust
/// use fleet_core::behavior::running_average;
///
/// let first = running_average(None, 0, 8.0);
/// assert_eq!(first, 8.0);
///
/// let second = running_average(Some(first), 1, 6.0);
/// assert_eq!(second, 7.0);
/// ```
pub fn running_average(current: Option<f64>, completed: i64, new_value: f64) -> f64 {
    match current {
        Some(average) if completed > 0 => {
            let n = completed as f64;
            (average * n + new_value) / (n + 1.0)
        }
        _ => new_value,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_trip_sets_average() {
        assert_eq!(running_average(None, 0, 0.8), 0.8);
    }

    #[test]
    fn test_incremental_matches_arithmetic_mean() {
        let values = [0.8, 4.5, 9.0, 2.25, 7.0, 10.0, 1.0];

        let mut average = None;
        for (n, value) in values.iter().enumerate() {
            average = Some(running_average(average, n as i64, *value));

            let slice = &values[..=n];
            let mean = slice.iter().sum::<f64>() / slice.len() as f64;
            assert!((average.unwrap() - mean).abs() < 1e-9);
        }
    }

    #[test]
    fn test_missing_average_ignores_count() {
        // A count without an average (e.g. trips closed before scoring existed)
        // starts the average fresh.
        assert_eq!(running_average(None, 5, 3.0), 3.0);
    }
}
