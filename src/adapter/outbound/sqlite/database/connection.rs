//! Database connection management using Diesel ORM.
//!
//! Provides connection pooling, migration support, and per-session pragmas
//! for each negotiable [`SessionMode`].

use std::time::Duration;

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::sql_types::Text;
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::StoreError;
use crate::port::SessionMode;

/// Embedded database migrations compiled from the migrations/ directory.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Type alias for a SQLite connection pool.
pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

/// Pool sizing and per-connection limits.
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    pub max_size: u32,
    /// Wait for a free pooled connection before reporting the store unavailable.
    pub acquire_timeout: Duration,
    pub busy_timeout_ms: u64,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_size: 5,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout_ms: 5000,
        }
    }
}

/// Pragmas applied to every pooled connection.
#[derive(Debug, Clone, Copy)]
struct SessionPragmas {
    mode: SessionMode,
    busy_timeout_ms: u64,
}

impl SessionPragmas {
    fn statements(&self) -> Vec<String> {
        let mode_pragmas: &[&str] = match self.mode {
            SessionMode::Strict => &[
                "PRAGMA journal_mode=WAL",
                "PRAGMA synchronous=FULL",
                "PRAGMA foreign_keys=ON",
            ],
            SessionMode::Relaxed => &["PRAGMA journal_mode=WAL", "PRAGMA synchronous=NORMAL"],
            SessionMode::Compatible => &["PRAGMA journal_mode=DELETE", "PRAGMA synchronous=FULL"],
        };
        std::iter::once(format!("PRAGMA busy_timeout={}", self.busy_timeout_ms))
            .chain(mode_pragmas.iter().map(|s| (*s).to_string()))
            .collect()
    }
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SessionPragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        for statement in self.statements() {
            diesel::sql_query(statement)
                .execute(conn)
                .map_err(diesel::r2d2::Error::QueryError)?;
        }
        Ok(())
    }
}

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}

/// Create a connection pool for the given database URL and session mode.
///
/// # Errors
/// Returns `ConnectionUnavailable` if no connection can be established.
pub fn create_pool(
    database_url: &str,
    mode: SessionMode,
    options: PoolOptions,
) -> Result<DbPool, StoreError> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    Pool::builder()
        .max_size(options.max_size)
        .connection_timeout(options.acquire_timeout)
        .connection_customizer(Box::new(SessionPragmas {
            mode,
            busy_timeout_ms: options.busy_timeout_ms,
        }))
        .build(manager)
        .map_err(|e| StoreError::ConnectionUnavailable(e.to_string()))
}

/// Run all pending database migrations.
///
/// # Errors
/// Returns an error if migrations fail.
pub fn run_migrations(pool: &DbPool) -> Result<(), StoreError> {
    let mut conn = pool
        .get()
        .map_err(|e| StoreError::ConnectionUnavailable(e.to_string()))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| StoreError::ConnectionUnavailable(format!("migration failed: {e}")))?;
    Ok(())
}

/// Check that the database granted what the session mode requires.
///
/// # Errors
/// Returns `ConnectionUnavailable` when strict mode did not get write-ahead logging.
pub fn verify_session(pool: &DbPool, mode: SessionMode) -> Result<(), StoreError> {
    let mut conn = pool
        .get()
        .map_err(|e| StoreError::ConnectionUnavailable(e.to_string()))?;
    let granted = diesel::sql_query("PRAGMA journal_mode")
        .get_result::<JournalMode>(&mut conn)
        .map_err(|e| StoreError::ConnectionUnavailable(e.to_string()))?
        .journal_mode;

    if mode == SessionMode::Strict && !granted.eq_ignore_ascii_case("wal") {
        return Err(StoreError::ConnectionUnavailable(format!(
            "strict session requires WAL, database granted '{granted}'"
        )));
    }
    Ok(())
}
