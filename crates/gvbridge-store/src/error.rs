//! Error types for the gvbridge-store crate.
//!
//! Only setup paths (opening the database, bootstrapping the schema) return
//! [`StoreError`]. The user record operations swallow storage failures and
//! report them through `tracing` instead.

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem preparation for the database file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A schema migration failed.
    #[error("migration v{version} failed: {message}")]
    Migration { version: u32, message: String },

    /// The connection mutex was poisoned by a panicking holder.
    #[error("connection lock poisoned: {0}")]
    Poisoned(String),
}
