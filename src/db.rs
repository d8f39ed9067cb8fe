use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use diesel::connection::{AnsiTransactionManager, SimpleConnection, TransactionManager};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::{debug, error, info, instrument, warn};

use crate::errors::{FlashcoreError, Result};
use crate::schema::{cards, reviews};

pub mod backup;

/// Migrations compiled into the binary
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Milliseconds a connection waits on a locked store before failing
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Where a store lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// A private store that disappears when its connection closes
    InMemory,
    /// A SQLite file
    File(PathBuf),
}

impl StoreLocation {
    fn connection_target(&self) -> String {
        match self {
            StoreLocation::InMemory => ":memory:".to_string(),
            StoreLocation::File(path) => path.to_string_lossy().into_owned(),
        }
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreLocation::InMemory => f.write_str(":memory:"),
            StoreLocation::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// How a `Database` handle opens and guards its store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub location: StoreLocation,
    /// Rejects every mutation and opens the store with `query_only`
    pub read_only: bool,
    /// Allows `initialize_schema(true)` to drop a non-empty persistent store
    pub allow_destructive_recreate: bool,
}

impl DatabaseConfig {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: StoreLocation::File(path.into()),
            read_only: false,
            allow_destructive_recreate: false,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            location: StoreLocation::InMemory,
            read_only: false,
            allow_destructive_recreate: false,
        }
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_destructive_recreate(mut self, allow: bool) -> Self {
        self.allow_destructive_recreate = allow;
        self
    }
}

/// A handle on one store
///
/// The handle owns at most one connection, opened on first use and guarded by
/// a mutex so the handle can be shared through an `Arc`. Operations hold the
/// lock for their whole duration, so every operation on a handle is serialized.
///
/// Closing an in-memory store discards its contents; the next operation starts
/// from an empty, freshly migrated store.
pub struct Database {
    config: DatabaseConfig,
    conn: Mutex<Option<SqliteConnection>>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Database {
    /// Creates a handle without connecting
    ///
    /// ### Arguments
    ///
    /// * `config` - Where the store lives and how it may be used
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            conn: Mutex::new(None),
        }
    }

    /// Creates a writable handle on a SQLite file
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(DatabaseConfig::file(path))
    }

    /// Creates a writable handle on a private in-memory store
    pub fn in_memory() -> Self {
        Self::new(DatabaseConfig::in_memory())
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn location(&self) -> &StoreLocation {
        &self.config.location
    }

    pub fn is_read_only(&self) -> bool {
        self.config.read_only
    }

    pub fn is_in_memory(&self) -> bool {
        self.config.location == StoreLocation::InMemory
    }

    /// The store file, if the store is not in memory
    pub fn file_path(&self) -> Option<&Path> {
        match &self.config.location {
            StoreLocation::File(path) => Some(path),
            StoreLocation::InMemory => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    /// Opens the connection if it is not already open
    ///
    /// ### Errors
    ///
    /// Returns `StoreUnavailable` when a read-only handle points at a missing
    /// file or the parent directory cannot be created, `Connection` when SQLite
    /// refuses the connection, and `Migration` when pending migrations fail.
    pub fn connect(&self) -> Result<()> {
        self.with_connection(|_| Ok(()))
    }

    /// Releases the connection; safe to call any number of times
    pub fn close(&self) {
        if self.lock().take().is_some() {
            info!(location = %self.config.location, "Database connection closed");
        }
    }

    /// Fails with `ReadOnlyViolation` if this handle is read-only
    pub fn ensure_writable(&self, operation: &'static str) -> Result<()> {
        if self.config.read_only {
            warn!(operation, location = %self.config.location, "Rejected mutation on read-only database");
            return Err(FlashcoreError::ReadOnlyViolation { operation });
        }
        Ok(())
    }

    /// Runs `f` on the connection, connecting first if needed
    pub(crate) fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T>,
    {
        let mut guard = self.lock();
        if guard.is_none() {
            *guard = Some(self.open_connection()?);
        }
        match guard.as_mut() {
            Some(conn) => f(conn),
            None => Err(FlashcoreError::StoreUnavailable {
                location: self.config.location.to_string(),
                reason: "connection was not established".to_string(),
            }),
        }
    }

    /// Runs `f` inside one transaction on the connection
    ///
    /// The transaction commits if `f` succeeds and rolls back otherwise. A
    /// failed rollback is logged and the error from `f` is returned.
    pub(crate) fn with_transaction<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T>,
    {
        self.with_connection(|conn| run_in_transaction(conn, operation, f))
    }

    /// Creates the schema, or drops and recreates it
    ///
    /// ### Arguments
    ///
    /// * `force_recreate` - Drop every table and rebuild the schema from the
    ///   migrations
    ///
    /// ### Errors
    ///
    /// Returns `ReadOnlyViolation` for `force_recreate` on a read-only handle,
    /// `DestructiveOperationRefused` when the safety check refuses the
    /// recreate, and `Migration` if a migration fails. A refused or failed
    /// recreate leaves the store untouched.
    #[instrument(skip(self), fields(location = %self.config.location))]
    pub fn initialize_schema(&self, force_recreate: bool) -> Result<()> {
        if self.config.read_only {
            if force_recreate {
                return Err(FlashcoreError::ReadOnlyViolation {
                    operation: "recreate the schema",
                });
            }
            if !self.is_in_memory() {
                warn!("Skipping schema initialization on a read-only database");
                return Ok(());
            }
        }

        let migrate = |conn: &mut SqliteConnection| {
            conn.run_pending_migrations(MIGRATIONS)
                .map(|applied| applied.len())
                .map_err(|e| FlashcoreError::Migration(e.to_string()))
        };
        self.with_connection(|conn| {
            let applied = if force_recreate {
                self.ensure_recreate_is_safe(conn)?;
                warn!("Dropping and recreating the schema");
                // Drop and rebuild commit together
                run_in_transaction(conn, "recreate schema", |conn| {
                    conn.revert_all_migrations(MIGRATIONS)
                        .map_err(|e| FlashcoreError::Migration(e.to_string()))?;
                    migrate(conn)
                })?
            } else {
                migrate(conn)?
            };
            info!(applied, force_recreate, "Schema initialized");
            Ok(())
        })
    }

    /// Refuses a destructive recreate that could discard data
    ///
    /// Allowed for in-memory stores, when `allow_destructive_recreate` is set,
    /// or when both `cards` and `reviews` are empty. A missing table counts as
    /// empty; any other failure to count refuses.
    fn ensure_recreate_is_safe(&self, conn: &mut SqliteConnection) -> Result<()> {
        if self.is_in_memory() {
            debug!("In-memory store, destructive recreate allowed");
            return Ok(());
        }
        if self.config.allow_destructive_recreate {
            warn!("Destructive recreate explicitly allowed by configuration");
            return Ok(());
        }

        let card_count = count_rows("cards", cards::table.count().get_result::<i64>(conn))?;
        let review_count = count_rows("reviews", reviews::table.count().get_result::<i64>(conn))?;
        if card_count > 0 || review_count > 0 {
            error!(card_count, review_count, "Refusing to recreate a non-empty store");
            return Err(FlashcoreError::DestructiveOperationRefused {
                reason: format!(
                    "the store holds {} cards and {} reviews; set allow_destructive_recreate to proceed",
                    card_count, review_count
                ),
            });
        }
        Ok(())
    }

    fn open_connection(&self) -> Result<SqliteConnection> {
        let started_at = Instant::now();
        let location = self.config.location.to_string();
        info!(
            location = %location,
            read_only = self.config.read_only,
            "Opening database connection"
        );

        if let StoreLocation::File(path) = &self.config.location {
            if self.config.read_only {
                if !path.exists() {
                    error!(location = %location, "Read-only database file does not exist");
                    return Err(FlashcoreError::StoreUnavailable {
                        location,
                        reason: "file does not exist and the handle is read-only".to_string(),
                    });
                }
            } else if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| FlashcoreError::StoreUnavailable {
                    location: location.clone(),
                    reason: format!("cannot create directory {}: {}", parent.display(), e),
                })?;
            }
        }

        let mut conn = SqliteConnection::establish(&self.config.location.connection_target())
            .map_err(|source| {
                error!(location = %location, error = %source, "Failed to open database");
                FlashcoreError::Connection {
                    location: location.clone(),
                    source,
                }
            })?;
        self.bootstrap_connection(&mut conn)?;

        info!(
            location = %location,
            duration_ms = started_at.elapsed().as_millis() as u64,
            "Database connection ready"
        );
        Ok(conn)
    }

    fn bootstrap_connection(&self, conn: &mut SqliteConnection) -> Result<()> {
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
            BUSY_TIMEOUT_MS
        ))
        .map_err(|e| FlashcoreError::storage("connection setup", e))?;

        if !self.config.read_only || self.is_in_memory() {
            let applied = conn
                .run_pending_migrations(MIGRATIONS)
                .map_err(|e| FlashcoreError::Migration(e.to_string()))?;
            if !applied.is_empty() {
                info!(applied = applied.len(), "Applied pending migrations");
            }
        }

        if self.config.read_only {
            conn.batch_execute("PRAGMA query_only = ON;")
                .map_err(|e| FlashcoreError::storage("connection setup", e))?;
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Option<SqliteConnection>> {
        // A panic while holding the lock leaves the connection usable.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn count_rows(table: &'static str, result: QueryResult<i64>) -> Result<i64> {
    match result {
        Ok(count) => Ok(count),
        Err(e) if e.to_string().contains("no such table") => {
            debug!(table, "Table missing, treating as empty");
            Ok(0)
        }
        Err(e) => Err(FlashcoreError::DestructiveOperationRefused {
            reason: format!("could not verify that {} is empty: {}", table, e),
        }),
    }
}

/// Runs `f` between BEGIN and COMMIT on `conn`
fn run_in_transaction<T, F>(conn: &mut SqliteConnection, operation: &'static str, f: F) -> Result<T>
where
    F: FnOnce(&mut SqliteConnection) -> Result<T>,
{
    <AnsiTransactionManager as TransactionManager<SqliteConnection>>::begin_transaction(conn)
        .map_err(|e| FlashcoreError::storage(operation, e))?;

    match f(conn) {
        Ok(value) => {
            // On a failed COMMIT diesel rolls back the outermost transaction itself.
            <AnsiTransactionManager as TransactionManager<SqliteConnection>>::commit_transaction(conn)
                .map_err(|e| {
                    error!(operation, error = %e, "Commit failed");
                    FlashcoreError::storage(operation, e)
                })?;
            Ok(value)
        }
        Err(err) => {
            warn!(operation, error = %err, "Rolling back transaction");
            if let Err(rollback_err) =
                <AnsiTransactionManager as TransactionManager<SqliteConnection>>::rollback_transaction(conn)
            {
                error!(
                    operation,
                    error = %rollback_err,
                    original_error = %err,
                    "Rollback failed"
                );
            }
            Err(err)
        }
    }
}
