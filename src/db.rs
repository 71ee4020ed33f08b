//! `SQLite` handle for crawled papers and search run logs.
//!
//! File databases run in WAL mode with a busy timeout so the progress spinner
//! can count rows while the crawler writes. Migrations under `migrations/` are
//! embedded and applied on open.
//!
//! ```no_run
//! # async fn open() -> Result<(), scopus_core::DbError> {
//! let db = scopus_core::Database::new(std::path::Path::new("papers.db")).await?;
//! db.close().await;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::{debug, instrument};

/// Pool size for file databases; `SQLite` serializes writers anyway.
const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// How long a connection waits on a locked database before `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database-related errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// Failed to open or configure the database.
    #[error("failed to open database: {0}")]
    Connection(#[from] sqlx::Error),

    /// Failed to apply the embedded migrations.
    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Pooled `SQLite` handle with the paper schema applied.
///
/// Cloning is cheap and shares the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the database at `db_path`, enables WAL and
    /// applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the file cannot be opened,
    /// or `DbError::Migration` if migrations fail.
    #[instrument(skip(db_path), fields(path = %db_path.display()))]
    pub async fn new(db_path: &Path) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        Self::migrate(pool).await
    }

    /// Creates a private in-memory database, mostly for tests.
    ///
    /// The pool is capped at one connection so every query sees the same
    /// in-memory database.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    #[instrument]
    pub async fn new_in_memory() -> Result<Self, DbError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self, DbError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!("database migrations applied");
        Ok(Self { pool })
    }

    /// The underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Whether the database runs in WAL mode.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the pragma query fails.
    #[instrument(skip(self))]
    pub async fn is_wal_enabled(&self) -> Result<bool, DbError> {
        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&self.pool)
            .await?;

        Ok(mode.eq_ignore_ascii_case("wal"))
    }

    /// Closes every pooled connection. Call before the process exits.
    #[instrument(skip(self))]
    pub async fn close(self) {
        self.pool.close().await;
    }
}
