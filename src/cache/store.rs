//! TTL-bounded response store
//!
//! Provides a `ResponseCache` that keeps values in memory together with the
//! instant they were stored. Freshness is measured on tokio's clock so that
//! tests can drive expiry with a paused runtime.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// A stored value and when it was stored
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    /// The cached value
    value: T,
    /// Monotonic store time, used for expiry
    stored_at: Instant,
    /// Wall-clock store time, reported to callers
    cached_at: DateTime<Utc>,
}

/// Result of a cache hit
#[derive(Debug, Clone, PartialEq)]
pub struct CachedData<T> {
    /// The cached value
    pub data: T,
    /// When the value was cached
    pub cached_at: DateTime<Utc>,
    /// How old the entry was at lookup time
    pub age: Duration,
}

/// Keeps responses in memory for a fixed time-to-live
///
/// An entry is fresh while its age is strictly below the TTL. Reads that find
/// a stale entry remove it and report a miss, so the map never returns data
/// older than the TTL.
#[derive(Debug)]
pub struct ResponseCache<T> {
    entries: HashMap<String, CacheEntry<T>>,
    ttl: Duration,
}

impl<T: Clone> ResponseCache<T> {
    /// Creates an empty cache with the given TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// The configured time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Stores `value` under `key`, replacing any previous entry
    pub fn write(&mut self, key: impl Into<String>, value: T) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
                cached_at: Utc::now(),
            },
        );
    }

    /// Looks up a fresh entry
    ///
    /// # Returns
    /// * `Some(CachedData<T>)` if the entry exists and is younger than the TTL
    /// * `None` if the entry is missing or expired (expired entries are removed)
    pub fn read(&mut self, key: &str) -> Option<CachedData<T>> {
        let entry = self.entries.get(key)?;
        let age = entry.stored_at.elapsed();

        if age >= self.ttl {
            self.entries.remove(key);
            return None;
        }

        Some(CachedData {
            data: entry.value.clone(),
            cached_at: entry.cached_at,
            age,
        })
    }

    /// Removes one entry, returning whether it existed
    pub fn invalidate(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Removes every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored entries, including ones not yet found stale
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
