//! Time-to-live cache over a pluggable key/value store.
//!
//! Every value is stored inside an envelope with an absolute expiry:
//!
//! ```json
//! { "data": [ ... ], "expiry": 1767225600000 }
//! ```
//!
//! `expiry` is epoch milliseconds, computed as `now + ttl_minutes * 60000`
//! at write time. Two read paths share the same entries:
//! - [`TtlCache::get_fresh`] only returns data while `now < expiry`
//! - [`TtlCache::get_any`] returns whatever is stored, however old, and is
//!   the stale fallback when a refresh fails
//!
//! Expired entries stay readable through `get_any` until they are
//! overwritten, removed, invalidated by prefix or swept by
//! [`TtlCache::purge_expired`].
//!
//! # Failure handling
//!
//! The plain operations never fail a caller. Write failures (serialization,
//! storage quota, disk errors) are logged and dropped; an entry that cannot
//! be decoded is logged and reported as a miss. The `try_` variants return
//! the failure instead, for writes and purges that must not be lost.
//!
//! # Examples
//!
//! ```rust
//! use hydrant_cli::cache::TtlCache;
//!
//! let cache = TtlCache::in_memory();
//! cache.set("dataset_TASKS", &vec!["a", "b"], 5);
//! let fresh: Option<Vec<String>> = cache.get_fresh("dataset_TASKS");
//! assert_eq!(fresh.map(|v| v.len()), Some(2));
//!
//! assert_eq!(cache.invalidate_prefix("dataset_"), 1);
//! ```

mod clock;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{CacheStore, FileStore, MemoryStore};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use crate::constants::MILLIS_PER_MINUTE;
use crate::core::HydrantError;

/// The stored form of a cached value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// The cached value
    pub data: T,
    /// Absolute expiry in epoch milliseconds
    pub expiry: i64,
}

impl<T> CacheEntry<T> {
    /// Whether the entry is still fresh at `now_millis`.
    #[must_use]
    pub const fn is_fresh_at(&self, now_millis: i64) -> bool {
        now_millis < self.expiry
    }
}

/// Expiry without the payload, for scans that do not need the data.
#[derive(Deserialize)]
struct EntryHeader {
    expiry: i64,
}

/// Summary of one stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    pub key: String,
    /// `None` when the stored value is not a valid envelope
    pub expires_at: Option<DateTime<Utc>>,
    pub fresh: bool,
    pub bytes: usize,
}

/// Read counters since the cache was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Fresh reads that returned data
    pub hits: u64,
    /// `get_any` reads that returned expired data
    pub stale_hits: u64,
    /// Reads that returned nothing
    pub misses: u64,
}

impl CacheStats {
    /// Share of reads that returned data, as a percentage.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.stale_hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits + self.stale_hits) as f64 / total as f64 * 100.0
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} hits, {} stale hits, {} misses ({:.1}% hit rate)",
            self.hits,
            self.stale_hits,
            self.misses,
            self.hit_rate()
        )
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Expiring cache of serializable values.
///
/// Cloning is cheap and clones share the store, the clock and the counters.
#[derive(Debug, Clone)]
pub struct TtlCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    counters: Arc<Counters>,
}

impl TtlCache {
    /// A cache over `store` using wall-clock time.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// A cache over `store` using `clock` for expiry decisions.
    #[must_use]
    pub fn with_clock(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            counters: Arc::new(Counters::default()),
        }
    }

    /// A cache over a fresh, unbounded [`MemoryStore`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Store `value` under `key` for `ttl_minutes`, replacing any previous entry.
    ///
    /// A zero TTL stores an entry that is already expired: only `get_any`
    /// will return it.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_minutes: u64) {
        if let Err(e) = self.try_set(key, value, ttl_minutes) {
            warn!(key, error = %e, "cache write failed, continuing without caching");
        }
    }

    /// [`set`](Self::set) for entries that must not be lost silently.
    ///
    /// # Errors
    ///
    /// Fails when the value cannot be serialized or stored.
    pub fn try_set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_minutes: u64,
    ) -> Result<(), HydrantError> {
        let ttl_millis = i64::try_from(ttl_minutes).unwrap_or(i64::MAX).saturating_mul(MILLIS_PER_MINUTE);
        let entry = CacheEntry {
            data: value,
            expiry: self.now().saturating_add(ttl_millis),
        };

        let encoded = serde_json::to_string(&entry)?;
        self.store.set(key, encoded)?;
        debug!(key, ttl_minutes, "cache write");
        Ok(())
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        let raw = self.store.get(key)?;
        match serde_json::from_str::<CacheEntry<T>>(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(key, error = %e, "ignoring corrupt cache entry");
                None
            }
        }
    }

    /// Data under `key` if it has not expired.
    #[must_use]
    pub fn get_fresh<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.read::<T>(key) {
            Some(entry) if entry.is_fresh_at(self.now()) => {
                Counters::bump(&self.counters.hits);
                debug!(key, "cache hit");
                Some(entry.data)
            }
            Some(_) => {
                Counters::bump(&self.counters.misses);
                debug!(key, "cache entry expired");
                None
            }
            None => {
                Counters::bump(&self.counters.misses);
                debug!(key, "cache miss");
                None
            }
        }
    }

    /// Data under `key` regardless of expiry.
    #[must_use]
    pub fn get_any<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.read::<T>(key) {
            Some(entry) => {
                if entry.is_fresh_at(self.now()) {
                    Counters::bump(&self.counters.hits);
                } else {
                    Counters::bump(&self.counters.stale_hits);
                    debug!(key, "serving expired cache entry");
                }
                Some(entry.data)
            }
            None => {
                Counters::bump(&self.counters.misses);
                None
            }
        }
    }

    /// Remove `key`, returning whether it existed.
    pub fn remove(&self, key: &str) -> bool {
        self.store.remove(key)
    }

    /// Remove `key` and fail if the removal cannot be persisted.
    ///
    /// # Errors
    ///
    /// Fails when the store cannot persist the removal.
    pub fn try_remove(&self, key: &str) -> Result<bool, HydrantError> {
        Ok(self.store.remove_all(&[key.to_string()])? > 0)
    }

    /// Remove every entry whose key starts with `prefix`; other keys are untouched.
    ///
    /// Returns the number of entries removed. A removal that cannot be
    /// persisted is logged and reported as zero.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        self.try_invalidate_prefix(prefix).unwrap_or_else(|e| {
            warn!(prefix, error = %e, "failed to invalidate cache entries");
            0
        })
    }

    /// [`invalidate_prefix`](Self::invalidate_prefix), failing when the
    /// removal does not reach the store.
    ///
    /// # Errors
    ///
    /// Fails when the store cannot persist the removal; the entries are then
    /// still cached.
    pub fn try_invalidate_prefix(&self, prefix: &str) -> Result<usize, HydrantError> {
        let matching: Vec<String> =
            self.store.keys().into_iter().filter(|key| key.starts_with(prefix)).collect();
        let removed = self.store.remove_all(&matching)?;
        info!(prefix, removed, "invalidated cache entries");
        Ok(removed)
    }

    /// Remove expired and undecodable entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.now();
        let stale: Vec<String> = self
            .store
            .keys()
            .into_iter()
            .filter(|key| {
                self.store.get(key).is_some_and(|raw| {
                    serde_json::from_str::<EntryHeader>(&raw).map_or(true, |header| now >= header.expiry)
                })
            })
            .collect();
        match self.store.remove_all(&stale) {
            Ok(removed) => {
                debug!(removed, "purged expired cache entries");
                removed
            }
            Err(e) => {
                warn!(error = %e, "failed to purge expired cache entries");
                0
            }
        }
    }

    /// Every stored key, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys = self.store.keys();
        keys.sort();
        keys
    }

    /// Expiry and size of every entry, sorted by key.
    #[must_use]
    pub fn entries(&self) -> Vec<EntryInfo> {
        let now = self.now();
        self.keys()
            .into_iter()
            .filter_map(|key| {
                let raw = self.store.get(&key)?;
                let expiry = serde_json::from_str::<EntryHeader>(&raw).ok().map(|h| h.expiry);
                Some(EntryInfo {
                    fresh: expiry.is_some_and(|expiry| now < expiry),
                    expires_at: expiry.and_then(DateTime::from_timestamp_millis),
                    bytes: raw.len(),
                    key,
                })
            })
            .collect()
    }

    /// Read counters so far.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            stale_hits: self.counters.stale_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
        }
    }
}
