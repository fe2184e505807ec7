//! SQLite connection pool: the catalog's connection provider.

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::persistence::PersistenceError;

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Holds a connection pool to the SQLite database.
///
/// Cloning is cheap; clones share the pool. Connections handed out by
/// [`Database::acquire`] and [`Database::begin`] go back to the pool when
/// dropped, and a transaction dropped without `commit` rolls back.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database described by `config`.
    ///
    /// The schema is not touched; run [`super::SchemaInitializer`] once at
    /// startup.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        // Ensure parent directory exists
        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| PersistenceError::Connectivity(sqlx::Error::Io(e)))?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await?;

        tracing::info!(
            url = %config.url,
            max_connections = config.max_connections,
            "Connected to catalog database"
        );

        Ok(Self { pool })
    }

    /// Create an in-memory database for testing. The schema is provisioned.
    #[cfg(test)]
    pub async fn new_in_memory() -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        // A single connection that never expires: the database lives and
        // dies with it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        super::SchemaInitializer::new(db.clone()).initialize().await?;
        Ok(db)
    }

    /// Check out a connection for exclusive use until it is dropped.
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>, PersistenceError> {
        Ok(self.pool.acquire().await?)
    }

    /// Start a transaction on a freshly acquired connection.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, PersistenceError> {
        Ok(self.pool.begin().await?)
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for checked-out connections to return, then close them all.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
