//! SQLite persistence for cursors, ledger records and reporter metadata.
//!
//! - `models`: row types for the three tables
//! - `repository`: queries and upserts
//!
//! The pool runs in WAL mode; the schema lives in `migrations/` and is applied
//! on every start.

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::{LedgerError, LedgerResult};

pub mod models;
pub mod repository;

const REQUIRED_TABLES: [&str; 3] = ["address_cursors", "ledger_records", "reporters"];

/// Creates a SQLite connection pool, applies migrations and verifies the schema.
///
/// In-memory URLs get a single connection: every SQLite memory connection is
/// its own database.
///
/// # Errors
///
/// Returns a database error if the URL does not parse, the connection fails or
/// the schema cannot be brought up to date.
///
/// # Example
///
/// ```no_run
/// use oracle_ledger_sync::db::create_pool;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool("sqlite:./ledger.db").await?;
///     Ok(())
/// }
/// ```
pub async fn create_pool(database_url: &str) -> LedgerResult<SqlitePool> {
    info!(database_url, "Connecting to database");

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| {
            LedgerError::database(
                format!("Failed to parse database URL: {database_url}"),
                Some(Box::new(e)),
            )
        })?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(30));

    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
        .map_err(|e| {
            LedgerError::database(
                format!("Failed to connect to database at {database_url}"),
                Some(Box::new(e)),
            )
        })?;

    info!("Running database migrations");
    run_migrations(&pool).await?;
    verify_database(&pool).await?;
    info!("Database migrations complete");

    Ok(pool)
}

/// Applies pending migrations from `migrations/`. Safe to run repeatedly.
///
/// # Errors
///
/// Returns a database error if a migration fails.
pub async fn run_migrations(pool: &SqlitePool) -> LedgerResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| {
            LedgerError::database("Failed to run database migrations", Some(Box::new(e)))
        })?;

    Ok(())
}

/// Verify that required tables exist after migrations.
///
/// # Errors
///
/// Returns a database error if any table is missing.
pub async fn verify_database(pool: &SqlitePool) -> LedgerResult<()> {
    let rows = sqlx::query_as::<_, (String,)>(
        r"
        SELECT name FROM sqlite_master
        WHERE type = 'table' AND name IN ('address_cursors', 'ledger_records', 'reporters')
        ",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| LedgerError::database("Failed to verify database schema", Some(Box::new(e))))?;

    if rows.len() < REQUIRED_TABLES.len() {
        let found: Vec<_> = rows.into_iter().map(|(name,)| name).collect();
        return Err(LedgerError::database(
            format!(
                "Database schema incomplete. Expected {:?}, found {found:?}",
                REQUIRED_TABLES
            ),
            None,
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_pool_and_migrations() {
        let pool = create_pool("sqlite::memory:")
            .await
            .expect("Failed to create pool");

        // Idempotent
        run_migrations(&pool)
            .await
            .expect("Failed to rerun migrations");

        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type='table'")
            .fetch_one(&pool)
            .await
            .expect("Failed to query tables");

        // 3 tables + migration history
        assert!(result.0 >= 4, "Expected at least 4 tables, got {}", result.0);
    }

    #[tokio::test]
    async fn test_memory_journal_mode() {
        // WAL is not available for :memory: databases
        let pool = create_pool("sqlite::memory:")
            .await
            .expect("Failed to create pool");

        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .expect("Failed to query journal mode");

        assert_eq!(result.0, "memory");
    }

    #[tokio::test]
    async fn test_file_database_uses_wal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite:{}", dir.path().join("ledger.db").display());

        let pool = create_pool(&url).await.expect("Failed to create pool");

        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .expect("Failed to query journal mode");

        assert_eq!(result.0, "wal");
    }

    #[tokio::test]
    async fn test_invalid_url_is_database_error() {
        let result = create_pool("postgres://nope").await;
        assert!(matches!(result, Err(LedgerError::DatabaseError { .. })));
    }
}
