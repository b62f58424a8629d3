//! Key/value storage behind the TTL cache.
//!
//! Stores hold opaque strings; the cache layers envelopes and expiry on top.
//! Two implementations are provided:
//! - [`MemoryStore`]: process-local, optionally quota-limited
//! - [`FileStore`]: a single JSON file, mirrored in memory and rewritten
//!   atomically on every change

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::core::HydrantError;
use crate::utils::fs::atomic_write;

/// String key/value storage used by [`TtlCache`](super::TtlCache).
pub trait CacheStore: Send + Sync + fmt::Debug {
    /// Raw value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Fails when the value cannot be persisted (quota exceeded, disk error).
    fn set(&self, key: &str, value: String) -> Result<(), HydrantError>;

    /// Remove `key`, returning whether it existed.
    fn remove(&self, key: &str) -> bool;

    /// Every stored key, in no particular order.
    fn keys(&self) -> Vec<String>;

    /// Remove several keys, returning how many existed.
    ///
    /// # Errors
    ///
    /// Fails when the removal cannot be persisted; the keys are then still
    /// present.
    fn remove_all(&self, keys: &[String]) -> Result<usize, HydrantError> {
        Ok(keys.iter().filter(|key| self.remove(key)).count())
    }
}

/// In-memory store with an optional size quota.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    /// An unbounded store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects writes once keys plus values exceed `quota_bytes`.
    #[must_use]
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: DashMap::new(),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Bytes used by keys and values.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.entries.iter().map(|entry| entry.key().len() + entry.value().len()).sum()
    }
}

/// Bytes in use once `replaced` bytes are swapped for `written` bytes.
///
/// `replaced` is read separately from `used` and may already be gone.
fn bytes_after_write(used: usize, replaced: usize, written: usize) -> usize {
    used.saturating_sub(replaced) + written
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: String) -> Result<(), HydrantError> {
        if let Some(quota) = self.quota_bytes {
            let replaced = self.entries.get(key).map_or(0, |old| key.len() + old.len());
            let needed = bytes_after_write(self.used_bytes(), replaced, key.len() + value.len());
            if needed > quota {
                return Err(HydrantError::CacheError {
                    message: format!("storage quota of {quota} bytes exceeded writing '{key}'"),
                });
            }
        }
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }
}

/// A JSON object file of key/value strings.
///
/// Reads are served from memory. Every change rewrites the whole file through
/// a temporary file and a rename, so a crash never leaves a half-written
/// cache behind.
pub struct FileStore {
    path: PathBuf,
    entries: DashMap<String, String>,
    write_lock: Mutex<()>,
}

impl fmt::Debug for FileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl FileStore {
    /// Open the store at `path`.
    ///
    /// A missing file is an empty store. An unreadable or corrupt file is
    /// also treated as empty (with a warning) and replaced on the next write.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = DashMap::new();

        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                Ok(stored) => {
                    debug!(path = %path.display(), entries = stored.len(), "loaded cache file");
                    for (key, value) in stored {
                        entries.insert(key, value);
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cache file is corrupt, starting empty");
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cache file is unreadable, starting empty");
            }
        }

        Self {
            path,
            entries,
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), HydrantError> {
        let _guard = self.write_lock.lock().map_err(|_| HydrantError::CacheError {
            message: "cache file lock poisoned".to_string(),
        })?;

        let snapshot: BTreeMap<String, String> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let content = serde_json::to_vec_pretty(&snapshot)?;

        atomic_write(&self.path, &content).map_err(|e| HydrantError::CacheError {
            message: format!("{e:#}"),
        })
    }

    fn persist_or_warn(&self) {
        if let Err(e) = self.persist() {
            warn!(path = %self.path.display(), error = %e, "failed to write cache file");
        }
    }
}

impl CacheStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: String) -> Result<(), HydrantError> {
        let previous = self.entries.insert(key.to_string(), value);
        if let Err(e) = self.persist() {
            // Keep memory and disk in agreement
            match previous {
                Some(old) => self.entries.insert(key.to_string(), old),
                None => self.entries.remove(key).map(|(_, v)| v),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> bool {
        let existed = self.entries.remove(key).is_some();
        if existed {
            self.persist_or_warn();
        }
        existed
    }

    fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    fn remove_all(&self, keys: &[String]) -> Result<usize, HydrantError> {
        let removed: Vec<(String, String)> =
            keys.iter().filter_map(|key| self.entries.remove(key.as_str())).collect();
        if removed.is_empty() {
            return Ok(0);
        }
        if let Err(e) = self.persist() {
            let count = removed.len();
            for (key, value) in removed {
                self.entries.insert(key, value);
            }
            warn!(path = %self.path.display(), error = %e, count, "failed to persist cache removal");
            return Err(e);
        }
        Ok(removed.len())
    }
}
