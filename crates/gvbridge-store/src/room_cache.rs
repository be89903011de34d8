//! Per-user room caches.
//!
//! Each [`User`](crate::User) carries two small maps keyed by [`RoomKey`]:
//! the last time the user read a room, and whether the room has been added
//! to the user's space. They are derived, session-scoped state and are never
//! written back to the database.
//!
//! The maps sit behind separate mutexes so traffic on one never waits on the
//! other. Every lock is held for a single map read or write. Entries are
//! never evicted; their number is bounded by the rooms a user is in.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── room key ─────────────────────────────────────────────────────────

/// Identifies a bridged room from one user's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomKey {
    /// Remote chat identifier.
    pub chat_id: String,
    /// Account the chat is seen through.
    pub receiver: String,
}

impl RoomKey {
    pub fn new(chat_id: impl Into<String>, receiver: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            receiver: receiver.into(),
        }
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.chat_id, self.receiver)
    }
}

// ── cache stats ──────────────────────────────────────────────────────

/// Counters tracking cache effectiveness.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Total cache hits since creation.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Total cache misses since creation.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Total lookups (hits + misses).
    pub fn total(&self) -> u64 {
        self.hits() + self.misses()
    }

    /// Hit rate between 0.0 and 1.0 (0.0 if no lookups).
    pub fn hit_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.hits() as f64 / total as f64
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={} misses={} total={} rate={:.2}%",
            self.hits(),
            self.misses(),
            self.total(),
            self.hit_rate() * 100.0,
        )
    }
}

// ── locked cache ─────────────────────────────────────────────────────

/// A `HashMap` behind its own mutex.
pub struct LockedCache<K, V> {
    name: &'static str,
    inner: Mutex<HashMap<K, V>>,
    stats: CacheStats,
}

impl<K, V> LockedCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Mutex::new(HashMap::new()),
            stats: CacheStats::default(),
        }
    }

    // Values are plain data, so a panic while the lock was held cannot
    // leave a half-written entry behind.
    fn lock(&self) -> MutexGuard<'_, HashMap<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a cached value. Returns `None` on miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let value = self.lock().get(key).cloned();
        match value {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        value
    }

    /// Insert or replace a value.
    pub fn set(&self, key: K, value: V) {
        self.lock().insert(key, value);
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl<K, V> fmt::Debug for LockedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockedCache")
            .field("name", &self.name)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

// ── cache pair ───────────────────────────────────────────────────────

/// The two room caches owned by one user.
#[derive(Debug)]
pub struct RoomCaches {
    /// Room → last time the user read it.
    pub last_read: LockedCache<RoomKey, DateTime<Utc>>,
    /// Room → whether it has been added to the user's space.
    pub in_space: LockedCache<RoomKey, bool>,
}

impl RoomCaches {
    pub fn new() -> Self {
        Self {
            last_read: LockedCache::new("last_read"),
            in_space: LockedCache::new("in_space"),
        }
    }
}

impl Default for RoomCaches {
    fn default() -> Self {
        Self::new()
    }
}

// ── tests ────────────────────────────────────────────────────────────
