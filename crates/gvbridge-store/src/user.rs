//! Bridge user records.
//!
//! A [`User`] ties a Matrix account (`mxid`) to the external account it
//! puppets and to the bridge rooms created for it. Records are built by a
//! [`UserQuery`], which hands every record a clone of the shared
//! [`Database`] handle and of its logging [`Span`].
//!
//! Storage failures never reach the caller. A lookup that finds nothing
//! returns `None` quietly; a row that cannot be decoded is logged at ERROR
//! and also returns `None`; a failed write is logged at WARN. Callers carry
//! on with whatever they already have in memory.

use std::fmt;

use chrono::{DateTime, Utc};
use rusqlite::{Row, params};
use tracing::{Span, debug, error, instrument, warn};

use crate::db::Database;
use crate::error::StoreResult;
use crate::fields;
use crate::identity::{self, ExternalId};
use crate::room_cache::{RoomCaches, RoomKey};

// ═══════════════════════════════════════════════════════════════════════
//  Statements
// ═══════════════════════════════════════════════════════════════════════

const SELECT_ALL: &str =
    r#"SELECT mxid, primary_did, management_room, space_room, timezone FROM "user""#;

const SELECT_BY_MXID: &str = r#"SELECT mxid, primary_did, management_room, space_room, timezone FROM "user" WHERE mxid = ?1"#;

const SELECT_BY_USERNAME: &str = r#"SELECT mxid, primary_did, management_room, space_room, timezone FROM "user" WHERE username = ?1"#;

const INSERT: &str = r#"INSERT INTO "user" (mxid, primary_did, management_room, space_room, timezone) VALUES (?1, ?2, ?3, ?4, ?5)"#;

const UPDATE: &str = r#"UPDATE "user" SET primary_did = ?1, management_room = ?2, space_room = ?3, timezone = ?4 WHERE mxid = ?5"#;

// ═══════════════════════════════════════════════════════════════════════
//  UserQuery
// ═══════════════════════════════════════════════════════════════════════

/// Factory and lookups for [`User`] records.
#[derive(Clone)]
pub struct UserQuery {
    db: Database,
    log: Span,
}

impl UserQuery {
    /// Create a query handle. Every record it builds logs under `log`.
    pub fn new(db: Database, log: Span) -> Self {
        Self { db, log }
    }

    /// A blank record bound to this query's database and span.
    ///
    /// Does no I/O. Fill in the fields and call [`User::insert`], or pass it
    /// to [`User::scan`].
    pub fn new_user(&self) -> User {
        User {
            db: self.db.clone(),
            log: self.log.clone(),
            mxid: String::new(),
            external: None,
            management_room: String::new(),
            space_room: String::new(),
            timezone: String::new(),
            phone_last_seen: None,
            phone_last_pinged: None,
            caches: RoomCaches::new(),
        }
    }

    /// Every stored user.
    ///
    /// Returns an empty list if the query cannot be issued. Rows that fail
    /// to decode are logged and left out.
    #[instrument(skip(self))]
    pub fn get_all(&self) -> Vec<User> {
        let result = self.db.execute(|conn| {
            let mut stmt = conn.prepare(SELECT_ALL)?;
            let mut rows = stmt.query([])?;
            let mut users = Vec::new();
            loop {
                match rows.next() {
                    Ok(Some(row)) => users.extend(self.new_user().scan(Ok(Some(row)))),
                    Ok(None) => break,
                    Err(err) => {
                        // Stepping failed mid-listing; report it like any
                        // other undecodable row and keep what we have.
                        let _ = self.new_user().scan(Err(err));
                        break;
                    }
                }
            }
            Ok(users)
        });
        let users = result.unwrap_or_default();
        debug!(count = users.len(), "loaded users");
        users
    }

    /// Look up a user by Matrix ID.
    #[instrument(skip(self))]
    pub fn get_by_mxid(&self, mxid: &str) -> Option<User> {
        self.get_one(SELECT_BY_MXID, mxid)
    }

    /// Look up a user by the local part of the linked external identity.
    #[instrument(skip(self))]
    pub fn get_by_username(&self, username: &str) -> Option<User> {
        self.get_one(SELECT_BY_USERNAME, username)
    }

    fn get_one(&self, sql: &str, key: &str) -> Option<User> {
        self.db
            .execute(|conn| {
                let mut stmt = conn.prepare(sql)?;
                let mut rows = stmt.query(params![key])?;
                let user = self.new_user().scan(rows.next());
                Ok(user)
            })
            .ok()
            .flatten()
    }
}

impl fmt::Debug for UserQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserQuery").finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  User
// ═══════════════════════════════════════════════════════════════════════

/// One bridge-local account.
pub struct User {
    db: Database,
    log: Span,

    /// Matrix user ID; primary key.
    pub mxid: String,
    /// Linked external account, `None` until the user logs in.
    pub external: Option<ExternalId>,
    pub management_room: String,
    pub space_room: String,
    /// IANA zone name, empty if unknown.
    pub timezone: String,
    /// Legacy; never written by [`User::insert`] or [`User::update`].
    pub phone_last_seen: Option<DateTime<Utc>>,
    /// Legacy; never written by [`User::insert`] or [`User::update`].
    pub phone_last_pinged: Option<DateTime<Utc>>,

    caches: RoomCaches,
}

impl User {
    /// Populate this record from one result row.
    ///
    /// `Ok(None)` and [`rusqlite::Error::QueryReturnedNoRows`] mean the
    /// lookup found nothing and return `None` without logging. Any other
    /// error, including a column of the wrong type, is logged at ERROR.
    pub fn scan(mut self, row: rusqlite::Result<Option<&Row<'_>>>) -> Option<Self> {
        let filled = match row {
            Ok(Some(row)) => self.fill_from(row),
            Ok(None) | Err(rusqlite::Error::QueryReturnedNoRows) => return None,
            Err(err) => Err(err),
        };
        match filled {
            Ok(()) => Some(self),
            Err(err) => {
                error!(parent: &self.log, error = %err, "database scan failed");
                None
            }
        }
    }

    fn fill_from(&mut self, row: &Row<'_>) -> rusqlite::Result<()> {
        let mxid: String = row.get(0)?;
        let primary_did: Option<String> = row.get(1)?;
        let management_room: String = row.get(2)?;
        let space_room: String = row.get(3)?;
        let timezone: Option<String> = row.get(4)?;

        self.mxid = mxid;
        self.external = identity::decode(primary_did.as_deref());
        self.management_room = management_room;
        self.space_room = space_room;
        self.timezone = fields::text_from_column(timezone);
        Ok(())
    }

    /// Write this record as a new row. Failures are logged, not returned.
    pub fn insert(&self) {
        match self.try_insert() {
            Ok(()) => debug!(parent: &self.log, mxid = %self.mxid, "user inserted"),
            Err(err) => {
                warn!(parent: &self.log, mxid = %self.mxid, error = %err, "failed to insert user")
            }
        }
    }

    fn try_insert(&self) -> StoreResult<()> {
        self.db.execute(|conn| {
            conn.execute(
                INSERT,
                params![
                    self.mxid,
                    identity::encode_local_part(self.external.as_ref()),
                    self.management_room,
                    self.space_room,
                    fields::text_to_column(&self.timezone),
                ],
            )?;
            Ok(())
        })
    }

    /// Rewrite the mutable columns of the row with this `mxid`.
    ///
    /// Failures are logged, not returned. Concurrent updates of the same
    /// user are last-write-wins.
    pub fn update(&self) {
        match self.try_update() {
            Ok(()) => debug!(parent: &self.log, mxid = %self.mxid, "user updated"),
            Err(err) => {
                warn!(parent: &self.log, mxid = %self.mxid, error = %err, "failed to update user")
            }
        }
    }

    fn try_update(&self) -> StoreResult<()> {
        self.db.execute(|conn| {
            conn.execute(
                UPDATE,
                params![
                    identity::encode_local_part(self.external.as_ref()),
                    self.management_room,
                    self.space_room,
                    fields::text_to_column(&self.timezone),
                    self.mxid,
                ],
            )?;
            Ok(())
        })
    }

    /// Link an external identity. An empty local part unlinks instead.
    pub fn link_external(&mut self, id: ExternalId) {
        self.external = (!id.is_empty()).then_some(id);
    }

    pub fn unlink_external(&mut self) {
        self.external = None;
    }

    pub fn phone_last_seen_column(&self) -> Option<i64> {
        fields::timestamp_to_column(self.phone_last_seen)
    }

    pub fn phone_last_pinged_column(&self) -> Option<i64> {
        fields::timestamp_to_column(self.phone_last_pinged)
    }

    // ── room caches ──────────────────────────────────────────────────

    /// Cached last-read time for a room.
    pub fn last_read(&self, room: &RoomKey) -> Option<DateTime<Utc>> {
        self.caches.last_read.get(room)
    }

    pub fn set_last_read(&self, room: RoomKey, ts: DateTime<Utc>) {
        self.caches.last_read.set(room, ts);
    }

    /// Cached space membership for a room.
    pub fn in_space(&self, room: &RoomKey) -> Option<bool> {
        self.caches.in_space.get(room)
    }

    pub fn set_in_space(&self, room: RoomKey, in_space: bool) {
        self.caches.in_space.set(room, in_space);
    }

    pub fn caches(&self) -> &RoomCaches {
        &self.caches
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("mxid", &self.mxid)
            .field("external", &self.external)
            .field("management_room", &self.management_room)
            .field("space_room", &self.space_room)
            .field("timezone", &self.timezone)
            .field("phone_last_seen", &self.phone_last_seen)
            .field("phone_last_pinged", &self.phone_last_pinged)
            .finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════
