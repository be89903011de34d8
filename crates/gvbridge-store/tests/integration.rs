//! Integration tests for the gvbridge-store crate.
//!
//! These tests exercise the user record lifecycle against a real SQLite
//! database on disk (via tempfile), including reopening the file and
//! sharing records across threads.

use std::sync::Arc;
use std::thread;

use chrono::DateTime;
use gvbridge_store::{Database, DbOptions, ExternalId, RoomKey, UserQuery};

fn open(path: &std::path::Path) -> UserQuery {
    let db = Database::open_and_migrate(path, &DbOptions::default()).unwrap();
    UserQuery::new(db, tracing::info_span!("user"))
}

// ═══════════════════════════════════════════════════════════════════════
//  Database lifecycle
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn open_and_migrate_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("bridge.db");

    let users = open(&db_path);
    assert!(users.get_all().is_empty());
    drop(users);

    let users = open(&db_path);
    assert!(users.get_all().is_empty());
    assert!(db_path.exists());
}

// ═══════════════════════════════════════════════════════════════════════
//  User lifecycle (on-disk database)
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn user_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("bridge.db");

    {
        let users = open(&db_path);
        let mut user = users.new_user();
        user.mxid = "@alice:example.org".into();
        user.link_external(ExternalId::new("15551234567", 4, 2));
        user.management_room = "!mgmt:example.org".into();
        user.space_room = "!space:example.org".into();
        user.timezone = "UTC".into();
        user.insert();
    }

    let users = open(&db_path);
    let user = users.get_by_mxid("@alice:example.org").unwrap();
    assert_eq!(user.external, Some(ExternalId::with_default_tags("15551234567")));
    assert_eq!(user.management_room, "!mgmt:example.org");
    assert_eq!(user.space_room, "!space:example.org");
    assert_eq!(user.timezone, "UTC");

    let by_username = users.get_by_username("15551234567").unwrap();
    assert_eq!(by_username.mxid, "@alice:example.org");
}

#[test]
fn login_then_logout_flow() {
    let dir = tempfile::tempdir().unwrap();
    let users = open(&dir.path().join("bridge.db"));

    let mut user = users.new_user();
    user.mxid = "@bob:example.org".into();
    user.insert();
    assert!(users.get_by_mxid("@bob:example.org").unwrap().external.is_none());

    let mut user = users.get_by_mxid("@bob:example.org").unwrap();
    user.link_external(ExternalId::with_default_tags("15557654321"));
    user.space_room = "!space:example.org".into();
    user.update();

    let linked = users.get_by_username("15557654321").unwrap();
    assert_eq!(linked.mxid, "@bob:example.org");
    assert_eq!(linked.space_room, "!space:example.org");

    let mut user = linked;
    user.unlink_external();
    user.update();
    assert!(users.get_by_username("15557654321").is_none());
    assert_eq!(
        users.get_by_mxid("@bob:example.org").unwrap().space_room,
        "!space:example.org"
    );
}

#[test]
fn concurrent_updates_last_write_wins() {
    let dir = tempfile::tempdir().unwrap();
    let users = open(&dir.path().join("bridge.db"));

    let mut user = users.new_user();
    user.mxid = "@carol:example.org".into();
    user.insert();

    let zones = ["Europe/Helsinki", "America/New_York", "Asia/Tokyo", "UTC"];
    let handles: Vec<_> = zones
        .iter()
        .map(|zone| {
            let users = users.clone();
            let zone = zone.to_string();
            thread::spawn(move || {
                let mut user = users.get_by_mxid("@carol:example.org").unwrap();
                user.timezone = zone;
                user.update();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let final_zone = users.get_by_mxid("@carol:example.org").unwrap().timezone;
    assert!(zones.contains(&final_zone.as_str()), "{final_zone}");
}

// ═══════════════════════════════════════════════════════════════════════
//  Room caches on a shared record
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn room_caches_shared_across_threads() {
    let dir = tempfile::tempdir().unwrap();
    let users = open(&dir.path().join("bridge.db"));

    let mut user = users.new_user();
    user.mxid = "@dave:example.org".into();
    user.insert();
    let user = Arc::new(users.get_by_mxid("@dave:example.org").unwrap());

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let user = Arc::clone(&user);
            thread::spawn(move || {
                for i in 0..50 {
                    let room = RoomKey::new(format!("chat-{t}-{i}"), "dave");
                    if t % 2 == 0 {
                        user.set_in_space(room, true);
                    } else {
                        user.set_last_read(room, DateTime::from_timestamp(i, 0).unwrap());
                    }
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(user.caches().in_space.len(), 100);
    assert_eq!(user.caches().last_read.len(), 100);
    assert_eq!(user.in_space(&RoomKey::new("chat-0-49", "dave")), Some(true));
    assert_eq!(
        user.last_read(&RoomKey::new("chat-1-7", "dave")),
        DateTime::from_timestamp(7, 0)
    );

    // Cache state never reaches the database.
    let reloaded = users.get_by_mxid("@dave:example.org").unwrap();
    assert!(reloaded.caches().in_space.is_empty());
    assert!(reloaded.caches().last_read.is_empty());
}
