//! SQLite database setup with WAL mode, mmap, and performance pragmas.
//!
//! The [`Database`] struct wraps a `rusqlite::Connection` behind an
//! `Arc<Mutex<>>`. Every statement runs synchronously on the calling
//! thread while the lock is held; async callers are expected to hop onto
//! the blocking pool (`tokio::task::spawn_blocking`) themselves.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::migration;

/// Default busy timeout so concurrent writers wait instead of failing.
pub const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5_000;

/// Tunables applied when a connection is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbOptions {
    /// How long SQLite waits on a locked database before giving up.
    pub busy_timeout_ms: u32,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

/// Thread-safe, cheaply cloneable handle to a SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database at `path` with default options.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with(path, &DbOptions::default())
    }

    /// Open (or create) a database at `path` and apply performance pragmas.
    ///
    /// Missing parent directories are created.
    pub fn open_with(path: impl AsRef<Path>, options: &DbOptions) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening database");

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::apply_pragmas(&conn, options)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database, useful for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("opening in-memory database");

        let conn = Connection::open_in_memory()?;
        Self::apply_pragmas(&conn, &DbOptions::default())?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open the database and bootstrap the schema.
    pub fn open_and_migrate(path: impl AsRef<Path>, options: &DbOptions) -> StoreResult<Self> {
        let db = Self::open_with(path, options)?;
        db.run_migrations()?;
        Ok(db)
    }

    /// Run all pending schema migrations.
    pub fn run_migrations(&self) -> StoreResult<()> {
        self.execute(migration::run_all)
    }

    /// Run a closure against the connection while holding the lock.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let count: i64 = db.execute(|conn| {
    ///     let count = conn.query_row("SELECT count(*) FROM \"user\"", [], |row| row.get(0))?;
    ///     Ok(count)
    /// })?;
    /// ```
    pub fn execute<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        f(&conn)
    }

    // ── pragmas ──────────────────────────────────────────────────────

    /// Apply all performance pragmas to a fresh connection.
    fn apply_pragmas(conn: &Connection, options: &DbOptions) -> StoreResult<()> {
        debug!("applying SQLite performance pragmas");

        // WAL mode: concurrent readers, non-blocking writes.
        conn.pragma_update(None, "journal_mode", "WAL")?;

        // NORMAL sync is safe with WAL; only the last transaction can be
        // lost on power failure.
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        // 64 MiB memory-mapped I/O.
        conn.pragma_update(None, "mmap_size", 67_108_864_i64)?;

        // Negative value means KiB: -16000 = ~16 MiB page cache.
        conn.pragma_update(None, "cache_size", -16_000_i32)?;

        conn.pragma_update(None, "temp_store", "MEMORY")?;

        conn.pragma_update(None, "busy_timeout", options.busy_timeout_ms)?;

        info!(
            busy_timeout_ms = options.busy_timeout_ms,
            "database pragmas applied"
        );
        Ok(())
    }
}

// ── tests ────────────────────────────────────────────────────────────
