//! # SQLite Handle
//!
//! One shared `SqlitePool` per process, plus the plumbing every repository
//! call goes through.
//!
//! ```text
//!   FleetConfig ─► DbConfig ─► Database::new ─► migrations
//!                                   │
//!            ┌──────────────────────┼───────────────────────┐
//!            ▼                      ▼                       ▼
//!      repositories          begin / commit            rollback
//!      (pool or &mut tx)     (bounded)                 (bounded, logged)
//! ```
//!
//! Every statement runs under [`bounded`]; past the configured statement
//! timeout the call fails with `DbError::Timeout`. A transaction dropped
//! without commit is rolled back by the driver.
//!
//! File databases use WAL so listing reads proceed while a trip commits.
//! In-memory databases hold exactly one connection for their whole life.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::car::CarRepository;
use crate::repository::payment::PaymentRepository;
use crate::repository::subscription::SubscriptionRepository;
use crate::repository::trip::TripRepository;
use crate::repository::user::UserRepository;

/// Path value that selects a private in-memory database.
const IN_MEMORY: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/fleet/fleet.db")
///     .max_connections(8)
///     .statement_timeout(Duration::from_secs(3));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// How long to wait for a free connection.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection. `None` keeps connections.
    /// Default: 10 minutes
    pub idle_timeout: Option<Duration>,

    /// Upper bound for a single statement (and for commit).
    /// Default: 3 seconds
    pub statement_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    /// The file is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            statement_timeout: Duration::from_secs(3),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection acquire timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-statement timeout.
    pub fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// The single connection is never recycled, since closing it would
    /// drop the database.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: None,
            statement_timeout: Duration::from_secs(3),
            run_migrations: true,
        }
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY
    }
}

// =============================================================================
// Statement Timeouts
// =============================================================================

/// Runs a database future under `limit`.
///
/// Timeouts are reported, never retried.
pub(crate) async fn bounded<T, F>(limit: Duration, operation: &'static str, fut: F) -> DbResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(DbError::from),
        Err(_) => {
            let after_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
            warn!(operation, after_ms, "Database call timed out");
            Err(DbError::Timeout {
                operation,
                after_ms,
            })
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared handle to the fleet database. Clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,

    /// Applied to every statement issued through the repositories.
    statement_timeout: Duration,
}

impl Database {
    /// Opens the pool (creating the file when missing), turns on foreign
    /// keys and applies pending migrations unless disabled.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening fleet database");

        let connect_options = if config.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());
            SqliteConnectOptions::from_str(&connect_url)
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
                // WAL mode: readers don't block the start/stop writers
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .create_if_missing(true)
        };

        // SQLite has foreign keys disabled by default for backwards compatibility
        let connect_options = connect_options.foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout);

        if config.is_in_memory() {
            pool_options = pool_options.max_lifetime(None::<Duration>);
        }

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            statement_timeout_ms = config.statement_timeout.as_millis() as u64,
            "Database pool created"
        );

        let db = Database {
            pool,
            statement_timeout: config.statement_timeout,
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending migrations.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn statement_timeout(&self) -> Duration {
        self.statement_timeout
    }

    /// Opens a transaction, bounded by the statement timeout.
    pub(crate) async fn begin(&self) -> DbResult<sqlx::Transaction<'static, sqlx::Sqlite>> {
        bounded(self.statement_timeout, "begin", self.pool.begin()).await
    }

    /// Commits a transaction, bounded by the statement timeout.
    pub(crate) async fn commit(&self, tx: sqlx::Transaction<'static, sqlx::Sqlite>) -> DbResult<()> {
        bounded(self.statement_timeout, "commit", tx.commit()).await
    }

    /// Rolls back a failed unit of work. A failed rollback is only logged;
    /// the driver discards the transaction when the connection is reused.
    pub(crate) async fn rollback(
        &self,
        tx: sqlx::Transaction<'static, sqlx::Sqlite>,
        operation: &'static str,
    ) {
        if let Err(e) = bounded(self.statement_timeout, "rollback", tx.rollback()).await {
            warn!(operation, error = %e, "Rollback failed");
        }
    }

    pub fn cars(&self) -> CarRepository {
        CarRepository::new(self.pool.clone(), self.statement_timeout)
    }

    pub fn trips(&self) -> TripRepository {
        TripRepository::new(self.pool.clone(), self.statement_timeout)
    }

    pub fn payments(&self) -> PaymentRepository {
        PaymentRepository::new(self.pool.clone(), self.statement_timeout)
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone(), self.statement_timeout)
    }

    pub fn subscriptions(&self) -> SubscriptionRepository {
        SubscriptionRepository::new(self.pool.clone(), self.statement_timeout)
    }

    pub async fn close(&self) {
        info!("Closing fleet database");
        self.pool.close().await;
    }

    /// `SELECT 1` within the statement timeout.
    pub async fn health_check(&self) -> bool {
        bounded(
            self.statement_timeout,
            "health_check",
            sqlx::query("SELECT 1").execute(&self.pool),
        )
        .await
        .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/fleet.db")
            .max_connections(10)
            .min_connections(2)
            .statement_timeout(Duration::from_millis(250));

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.statement_timeout, Duration::from_millis(250));
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result: DbResult<()> = bounded(Duration::from_millis(10), "sleep", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(
            result,
            Err(DbError::Timeout {
                operation: "sleep",
                after_ms: 10
            })
        ));
    }
}
