//! # gvbridge-store
//!
//! Persistence for the bridge's user records.
//!
//! Each [`User`] maps a Matrix account to the external account it puppets
//! and to the bridge rooms created for it, and carries two per-user room
//! caches that live only as long as the record does.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  RoomCaches (two independently locked   │
//! │  maps per User, never persisted)        │
//! ├─────────────────────────────────────────┤
//! │  UserQuery / User (lookups, scan,       │
//! │  insert, update)                        │
//! │  identity (primary_did ⇄ ExternalId)    │
//! │  fields (unset ⇄ NULL)                  │
//! ├─────────────────────────────────────────┤
//! │  Database (rusqlite WAL + mmap)         │
//! │  Migrations (versioned, transactional)  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use gvbridge_store::{Database, DbOptions, UserQuery};
//!
//! let db = Database::open_and_migrate("data/gvbridge.db", &DbOptions::default())?;
//! let users = UserQuery::new(db, tracing::info_span!("user"));
//! if let Some(user) = users.get_by_mxid("@alice:example.org") {
//!     println!("{} → {:?}", user.mxid, user.external);
//! }
//! ```

pub mod db;
pub mod error;
pub mod fields;
pub mod identity;
pub mod migration;
pub mod room_cache;
pub mod user;

#[cfg(test)]
mod test_support;

// ── re-exports ───────────────────────────────────────────────────────

pub use db::{Database, DbOptions};
pub use error::{StoreError, StoreResult};
pub use identity::{DEFAULT_AGENT, DEFAULT_DEVICE, ExternalId};
pub use room_cache::{CacheStats, LockedCache, RoomCaches, RoomKey};
pub use user::{User, UserQuery};
