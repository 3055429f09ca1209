//! Short-TTL in-memory cache for fetched weather payloads.
//!
//! Stale entries are never swept; they sit inert until the same key is
//! written again. With a bound configured, inserting a new key into a full
//! cache evicts the entry fetched longest ago.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use crate::types::{CacheKey, DataPayload};

/// Source of "now" for freshness checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Used by tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move forward by `by`, saturating at the latest representable instant.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = chrono::Duration::from_std(by)
            .ok()
            .and_then(|by| now.checked_add_signed(by))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: DataPayload,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    /// A TTL too large for chrono to represent never expires.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now.signed_duration_since(self.fetched_at) < ttl,
            Err(_) => true,
        }
    }
}

#[derive(Debug)]
pub struct FreshnessCache {
    entries: HashMap<CacheKey, CacheEntry>,
    ttl: Duration,
    max_entries: Option<usize>,
}

impl FreshnessCache {
    pub const DEFAULT_TTL: Duration = Duration::from_millis(300_000);

    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            max_entries: None,
        }
    }

    /// Cap the number of entries. `None` keeps the cache unbounded.
    pub fn with_max_entries(mut self, max_entries: Option<usize>) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The entry for `key` if it was fetched less than one TTL before `now`.
    pub fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<&CacheEntry> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_fresh(now, self.ttl))
    }

    /// Insert or overwrite unconditionally.
    pub fn put(&mut self, key: CacheKey, payload: DataPayload, now: DateTime<Utc>) {
        if let Some(max) = self.max_entries {
            if !self.entries.contains_key(&key) && self.entries.len() >= max {
                self.evict_oldest();
            }
        }

        self.entries.insert(
            key,
            CacheEntry {
                payload,
                fetched_at: now,
            },
        );
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.fetched_at)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            tracing::debug!("Evicting cache entry {}", key);
            self.entries.remove(&key);
        }
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for FreshnessCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}
