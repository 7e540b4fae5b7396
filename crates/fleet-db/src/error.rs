//! Storage errors and the engine-wide error.
//!
//! `DbError` says what went wrong at the SQLite level. Constraint failures
//! keep the `table.column` SQLite names so callers can turn a specific
//! violation into a domain error (a second open trip, a duplicate plate).
//! `FleetError` is what every public engine operation returns; its
//! [`FleetError::kind`] is the stable category an HTTP layer maps to a status.

use fleet_core::{CoreError, ErrorKind, ValidationError};
use thiserror::Error;

const UNIQUE_FAILED: &str = "UNIQUE constraint failed: ";
const FOREIGN_KEY_FAILED: &str = "FOREIGN KEY constraint failed";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} {id} does not exist")]
    NotFound { entity: String, id: String },

    /// `field` is the `table.column` list SQLite reports, e.g.
    /// `trips.user_email` for the open-trip-per-user index.
    #[error("{field} must be unique ('{value}')")]
    UniqueViolation { field: String, value: String },

    /// A car still referenced by trips, or a trip for an unknown user.
    #[error("Referenced row missing or still in use: {message}")]
    ForeignKeyViolation { message: String },

    /// Never retried; the surrounding transaction rolls back on drop.
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },

    #[error("Cannot open database: {0}")]
    ConnectionFailed(String),

    #[error("Cannot apply migrations: {0}")]
    MigrationFailed(String),

    #[error("Statement failed: {0}")]
    QueryFailed(String),

    #[error("No database connection available")]
    PoolExhausted,

    #[error("Database driver error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// True for a unique violation that names `table.column`.
    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. } if field.split(", ").any(|f| f == column))
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(self, DbError::ForeignKeyViolation { .. })
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::NotFound { .. } => ErrorKind::NotFound,
            DbError::UniqueViolation { .. } | DbError::ForeignKeyViolation { .. } => {
                ErrorKind::Conflict
            }
            _ => ErrorKind::Internal,
        }
    }

    /// Classifies a SQLite error message.
    fn from_sqlite_message(message: &str) -> Self {
        if let Some(columns) = message.strip_prefix(UNIQUE_FAILED) {
            DbError::duplicate(columns, "unknown")
        } else if message.starts_with(FOREIGN_KEY_FAILED) {
            DbError::ForeignKeyViolation {
                message: message.to_string(),
            }
        } else {
            DbError::QueryFailed(message.to_string())
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Row", "unknown"),
            sqlx::Error::Database(db_err) => DbError::from_sqlite_message(db_err.message()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Engine Error
// =============================================================================

/// The error every public engine operation returns.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl FleetError {
    /// Taxonomy bucket the HTTP layer maps to a status code.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FleetError::Core(e) => e.kind(),
            FleetError::Db(e) => e.kind(),
        }
    }

    /// User-facing message. Internal failures are not described in detail.
    pub fn message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "internal error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<ValidationError> for FleetError {
    fn from(err: ValidationError) -> Self {
        FleetError::Core(CoreError::Validation(err))
    }
}

/// Result type for engine operations.
pub type FleetResult<T> = Result<T, FleetError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            DbError::duplicate("cars.license_plate", "ABC1234").kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            DbError::Timeout {
                operation: "start_trip",
                after_ms: 3000
            }
            .kind(),
            ErrorKind::Internal
        );
        assert_eq!(DbError::not_found("Car", "ABC1234").kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_sqlite_messages_are_classified() {
        let err = DbError::from_sqlite_message("UNIQUE constraint failed: cars.license_plate");
        assert!(err.is_unique_violation_on("cars.license_plate"));

        let err = DbError::from_sqlite_message("UNIQUE constraint failed: users.username");
        assert!(!err.is_unique_violation_on("users.email"));

        let err = DbError::from_sqlite_message("FOREIGN KEY constraint failed");
        assert!(err.is_foreign_key_violation());
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = DbError::from_sqlite_message("CHECK constraint failed: cars");
        assert!(matches!(err, DbError::QueryFailed(_)));
    }

    #[test]
    fn test_unique_violation_column_match() {
        let err = DbError::duplicate("trips.user_email", "unknown");
        assert!(err.is_unique_violation_on("trips.user_email"));
        assert!(!err.is_unique_violation_on("trips.car_license_plate"));
    }

    #[test]
    fn test_internal_message_is_generic() {
        let err: FleetError = DbError::QueryFailed("disk I/O error".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.message(), "internal error");

        let err: FleetError = CoreError::CarNotFound("ABC1234".to_string()).into();
        assert_eq!(err.message(), "Car not found: ABC1234");
    }
}
