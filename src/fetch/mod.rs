//! Dataset fetching behind the TTL cache.
//!
//! The fetch layer is the boundary between the hydration engine and the
//! remote table store. It decides where rows come from:
//!
//! 1. **No credential**: the built-in demo datasets ([`FixtureSource`]). The
//!    preview is read-only and never cached.
//! 2. **Fresh cache entry** under `dataset_<KEY>`: served without a request.
//! 3. **Remote fetch** through a [`DatasetSource`]: rows are indexed in fetch
//!    order and cached for the configured TTL.
//! 4. **Remote failure**: for anything except a credential failure the last
//!    known snapshot (however old) is served with a warning. Credential
//!    failures always propagate.
//!
//! Several datasets are loaded with [`DatasetFetcher::fetch_many`], which
//! runs the fetches concurrently and fails as a whole if any of them fails.
//! Hydration therefore never sees a partial set of datasets.
//!
//! Writes go through a [`DatasetSink`] and carry raw values only: derived
//! hydration fields are stripped first, and the dataset's cache entry is
//! dropped afterwards so the next read sees the change.

mod fixtures;
mod http;

pub use fixtures::FixtureSource;
pub use http::{HttpSource, parse_values_payload};

use futures::future::try_join_all;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::future::Future;
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::constants::{
    CREDENTIAL_FINGERPRINT_KEY, CREDENTIAL_FINGERPRINT_TTL_MINUTES, DATASET_CACHE_PREFIX,
    DEFAULT_CACHE_TTL_MINUTES,
};
use crate::core::HydrantError;
use crate::dataset::{DatasetKey, DatasetMap, Record, Row, editable_columns, index_records};
use crate::hydration::Hydrator;
use crate::registry::Registry;

/// A bearer token for the remote table store.
///
/// The secret never appears in `Debug` or `Display` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building requests.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({self})")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible: String = self.0.chars().take(4).collect();
        if self.0.chars().count() > 8 {
            write!(f, "{visible}****")
        } else {
            f.write_str("****")
        }
    }
}

/// Where raw records come from.
pub trait DatasetSource: Send + Sync {
    /// All records of `key`, in remote order.
    fn fetch_records(
        &self,
        key: DatasetKey,
        credential: &Credential,
    ) -> impl Future<Output = Result<Vec<Record>, HydrantError>> + Send;
}

/// Row mutations against the remote table.
///
/// Rows are addressed by their 1-based `row_index` and carry raw values only.
pub trait DatasetSink: Send + Sync {
    fn append_row(
        &self,
        key: DatasetKey,
        credential: &Credential,
        values: &Record,
    ) -> impl Future<Output = Result<(), HydrantError>> + Send;

    fn update_row(
        &self,
        key: DatasetKey,
        credential: &Credential,
        row_index: usize,
        values: &Record,
    ) -> impl Future<Output = Result<(), HydrantError>> + Send;

    fn delete_row(
        &self,
        key: DatasetKey,
        credential: &Credential,
        row_index: usize,
    ) -> impl Future<Output = Result<(), HydrantError>> + Send;
}

/// A change to one dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum RowMutation {
    /// Add a row at the end of the table.
    Append(Record),
    /// Replace the row at `row.row_index`; `row` may be hydrated.
    Update(Row),
    /// Delete the row at this index.
    Delete(usize),
}

/// Cache key of a dataset snapshot.
#[must_use]
pub fn cache_key(key: DatasetKey) -> String {
    format!("{DATASET_CACHE_PREFIX}{key}")
}

/// Identity of the credential and endpoint that cached datasets belong to.
///
/// A SHA-256 digest, so the token itself never reaches the cache file.
#[must_use]
pub fn credential_fingerprint(credential: &Credential, endpoint: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(endpoint.unwrap_or_default().as_bytes());
    hasher.update([0]);
    hasher.update(credential.secret().as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Loads datasets through the cache and forwards writes to the remote store.
#[derive(Debug, Clone)]
pub struct DatasetFetcher<S> {
    source: S,
    fixtures: FixtureSource,
    cache: TtlCache,
    ttl_minutes: u64,
    registry: &'static Registry,
}

impl<S: DatasetSource> DatasetFetcher<S> {
    /// A fetcher over `source`, caching in `cache` with the default TTL.
    #[must_use]
    pub fn new(source: S, cache: TtlCache) -> Self {
        Self {
            source,
            fixtures: FixtureSource,
            cache,
            ttl_minutes: DEFAULT_CACHE_TTL_MINUTES,
            registry: Registry::builtin(),
        }
    }

    /// Use `ttl_minutes` for new cache entries.
    #[must_use]
    pub const fn with_ttl(mut self, ttl_minutes: u64) -> Self {
        self.ttl_minutes = ttl_minutes;
        self
    }

    /// Strip derived fields using `registry` instead of the builtin one.
    #[must_use]
    pub const fn with_registry(mut self, registry: &'static Registry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub const fn cache(&self) -> &TtlCache {
        &self.cache
    }

    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Rows of `key`, from the preview, the cache or the remote store.
    ///
    /// # Errors
    ///
    /// Credential failures always propagate. Other remote failures propagate
    /// only when there is no cached snapshot to fall back on.
    pub async fn fetch(
        &self,
        key: DatasetKey,
        credential: Option<&Credential>,
    ) -> Result<Vec<Row>, HydrantError> {
        let Some(credential) = credential else {
            debug!(dataset = %key, "no credential, serving preview data");
            return Ok(self.fixtures.rows(key));
        };

        if let Some(rows) = self.cache.get_fresh::<Vec<Row>>(&cache_key(key)) {
            debug!(dataset = %key, rows = rows.len(), "serving cached dataset");
            return Ok(rows);
        }

        self.fetch_remote(key, credential).await
    }

    /// Rows of `key` straight from the remote store, bypassing fresh cache entries.
    ///
    /// # Errors
    ///
    /// As [`fetch`](Self::fetch).
    pub async fn refresh(
        &self,
        key: DatasetKey,
        credential: Option<&Credential>,
    ) -> Result<Vec<Row>, HydrantError> {
        match credential {
            Some(credential) => self.fetch_remote(key, credential).await,
            None => Ok(self.fixtures.rows(key)),
        }
    }

    async fn fetch_remote(
        &self,
        key: DatasetKey,
        credential: &Credential,
    ) -> Result<Vec<Row>, HydrantError> {
        let cache_key = cache_key(key);
        match self.source.fetch_records(key, credential).await {
            Ok(records) => {
                let rows = index_records(records);
                info!(dataset = %key, rows = rows.len(), "fetched dataset");
                self.cache.set(&cache_key, &rows, self.ttl_minutes);
                Ok(rows)
            }
            Err(e) if e.is_credential_failure() => Err(e),
            Err(e) => match self.cache.get_any::<Vec<Row>>(&cache_key) {
                Some(rows) => {
                    warn!(dataset = %key, error = %e, "fetch failed, serving last known data");
                    Ok(rows)
                }
                None => Err(e),
            },
        }
    }

    /// Load several datasets concurrently.
    ///
    /// # Errors
    ///
    /// The first failing fetch fails the whole load.
    pub async fn fetch_many(
        &self,
        keys: &[DatasetKey],
        credential: Option<&Credential>,
    ) -> Result<DatasetMap, HydrantError> {
        self.fetch_many_with(keys, credential, |_| {}).await
    }

    /// [`fetch_many`](Self::fetch_many), calling `on_loaded` as each dataset arrives.
    ///
    /// # Errors
    ///
    /// The first failing fetch fails the whole load.
    pub async fn fetch_many_with<F>(
        &self,
        keys: &[DatasetKey],
        credential: Option<&Credential>,
        on_loaded: F,
    ) -> Result<DatasetMap, HydrantError>
    where
        F: Fn(DatasetKey) + Sync,
    {
        let on_loaded = &on_loaded;
        let loaded = try_join_all(keys.iter().map(|key| async move {
            let rows = self.fetch(*key, credential).await?;
            on_loaded(*key);
            Ok::<_, HydrantError>((*key, rows))
        }))
        .await?;
        Ok(loaded.into_iter().collect())
    }

    /// Drop every cached dataset; call on sign-in and sign-out.
    ///
    /// Returns the number of snapshots removed.
    ///
    /// # Errors
    ///
    /// Fails when the purge cannot be persisted. The previous credential's
    /// snapshots are then still cached and must not be served.
    pub fn on_credential_change(&self) -> Result<usize, HydrantError> {
        self.cache.try_invalidate_prefix(DATASET_CACHE_PREFIX)
    }

    /// Tie the cached datasets to `fingerprint`, purging them when they were
    /// cached under a different one.
    ///
    /// `None` is the preview: nothing is recorded, but datasets cached for a
    /// credential are still dropped. Returns the number of snapshots removed.
    ///
    /// # Errors
    ///
    /// Fails when the purge or the new fingerprint cannot be persisted.
    pub fn bind_credential(&self, fingerprint: Option<&str>) -> Result<usize, HydrantError> {
        let stored = self.cache.get_any::<String>(CREDENTIAL_FINGERPRINT_KEY);
        if stored.as_deref() == fingerprint {
            return Ok(0);
        }

        let purged = self.on_credential_change()?;
        match fingerprint {
            Some(fingerprint) => {
                self.cache.try_set(CREDENTIAL_FINGERPRINT_KEY, fingerprint, CREDENTIAL_FINGERPRINT_TTL_MINUTES)?;
            }
            None => {
                self.cache.try_remove(CREDENTIAL_FINGERPRINT_KEY)?;
            }
        }
        info!(purged, "credential changed, cached datasets dropped");
        Ok(purged)
    }

    /// Column order used for writes: the editable schema of the last known
    /// snapshot, falling back to the order of the row itself.
    fn write_columns(&self, key: DatasetKey) -> Vec<String> {
        self.cache
            .get_any::<Vec<Row>>(&cache_key(key))
            .map(|rows| editable_columns(&rows, self.registry))
            .unwrap_or_default()
    }

    fn raw_values(&self, key: DatasetKey, fields: Record) -> Record {
        let hydrator = Hydrator::new(self.registry);
        let stripped = hydrator.strip_derived(&Row::new(0, fields)).fields;

        let mut ordered = Record::new();
        for column in self.write_columns(key) {
            if let Some(value) = stripped.get(&column) {
                ordered.insert(column, value.clone());
            }
        }
        for (column, value) in stripped {
            if !ordered.contains_key(&column) {
                ordered.insert(column, value);
            }
        }
        ordered
    }
}

impl<S: DatasetSource + DatasetSink> DatasetFetcher<S> {
    /// Apply `mutation` to the remote table and drop the dataset's cache entry.
    ///
    /// # Errors
    ///
    /// [`HydrantError::ReadOnlyPreview`] without a credential,
    /// [`HydrantError::RowNotFound`] for row index 0, and any sink failure.
    pub async fn write(
        &self,
        key: DatasetKey,
        credential: Option<&Credential>,
        mutation: RowMutation,
    ) -> Result<(), HydrantError> {
        let credential = credential.ok_or_else(|| HydrantError::ReadOnlyPreview {
            dataset: key.to_string(),
        })?;

        match mutation {
            RowMutation::Append(record) => {
                let values = self.raw_values(key, record);
                self.source.append_row(key, credential, &values).await?;
            }
            RowMutation::Update(row) => {
                let row_index = checked_index(key, row.row_index)?;
                let values = self.raw_values(key, row.fields);
                self.source.update_row(key, credential, row_index, &values).await?;
            }
            RowMutation::Delete(row_index) => {
                let row_index = checked_index(key, row_index)?;
                self.source.delete_row(key, credential, row_index).await?;
            }
        }

        self.cache.remove(&cache_key(key));
        info!(dataset = %key, "dataset modified, cache entry dropped");
        Ok(())
    }
}

fn checked_index(key: DatasetKey, row_index: usize) -> Result<usize, HydrantError> {
    if row_index == 0 {
        return Err(HydrantError::RowNotFound {
            dataset: key.to_string(),
            row_index,
        });
    }
    Ok(row_index)
}

/// Render a cell for a text-only remote store.
pub(crate) fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
