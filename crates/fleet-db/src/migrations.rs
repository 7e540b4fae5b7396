//! Embedded schema migrations.
//!
//! SQL files live in the workspace `migrations/sqlite/` directory as
//! `NNN_description.sql` and are compiled into the binary. `sqlx` records
//! applied versions in `_sqlx_migrations`; a shipped file is never edited,
//! changes go into the next number.
//!
//! `001_initial_schema.sql` creates users, cars, trips, payments and the
//! subscription tables, and seeds the three plans.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Embedded migrations from the workspace `migrations/sqlite` directory.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies whatever the database has not seen yet. Safe to call on every start.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    info!(available = MIGRATOR.migrations.len(), "Schema up to date");
    Ok(())
}

/// Returns `(total_migrations, applied_migrations)` for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((total, applied as usize))
}
