//! Database connection management

use std::str::FromStr;
use std::time::Duration;

use sqlx::migrate::MigrateError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};

use crate::orders::DEFAULT_CHECKOUT_TIMEOUT;

pub use sqlx::Error as SqlxError;

/// Writers queue on the lock; readers run beside them under WAL
const MAX_CONNECTIONS: u32 = 8;

/// Slack on top of the checkout bound, covering the commit that follows it
const BUSY_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

/// How long a writer waits for another writer's lock before giving up.
///
/// Checkout holds the write lock across the gateway call, so every other
/// writer must be willing to wait out a whole checkout.
pub const DEFAULT_BUSY_TIMEOUT: Duration =
    Duration::from_secs(DEFAULT_CHECKOUT_TIMEOUT.as_secs() + BUSY_TIMEOUT_MARGIN.as_secs());

/// The lock wait needed when checkouts are bounded by `checkout_timeout`.
#[must_use]
pub fn busy_timeout_for(checkout_timeout: Duration) -> Duration {
    checkout_timeout.saturating_add(BUSY_TIMEOUT_MARGIN)
}

#[derive(Debug, Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database file, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the database cannot be opened.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        Self::connect_with_busy_timeout(database_url, DEFAULT_BUSY_TIMEOUT).await
    }

    /// Connect with an explicit lock wait. Use [`busy_timeout_for`] with
    /// the configured checkout timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the database cannot be opened.
    pub async fn connect_with_busy_timeout(
        database_url: &str,
        busy_timeout: Duration,
    ) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(busy_timeout)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        Ok(Self::new(pool))
    }

    /// A private in-memory database.
    ///
    /// Every SQLite memory connection is its own database, so the pool is
    /// pinned to a single connection that is never recycled.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect_in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self::new(pool))
    }

    /// Apply the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails to apply.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Begin a transaction.
    ///
    /// SQLite transactions start deferred, so callers that write must make a
    /// write their first statement to take the write lock up front.
    ///
    /// # Errors
    ///
    /// Returns an error when starting the transaction fails.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
