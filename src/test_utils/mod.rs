//! Test utilities shared by unit and integration tests.
//!
//! Enabled for `cfg(test)` and by the `test-utils` feature:
//!
//! - [`init_test_logging`]: once-only tracing setup
//! - [`record`] / [`row`] / [`rows`]: build records and rows from `json!` literals
//! - [`ScriptedSource`]: a programmable [`DatasetSource`] + [`DatasetSink`]

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Once};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::core::HydrantError;
use crate::dataset::{DatasetKey, Record, Row, index_records};
use crate::fetch::{Credential, DatasetSink, DatasetSource, RowMutation};

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` if given, else `RUST_LOG`; with neither, logging stays off.
///
/// ```rust,ignore
/// hydrant_cli::test_utils::init_test_logging(Some(tracing::Level::DEBUG));
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// A record from a `json!` object literal.
///
/// # Panics
///
/// Panics if `value` is not an object.
#[must_use]
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// A row with an explicit index from a `json!` object literal.
#[must_use]
pub fn row(row_index: usize, value: Value) -> Row {
    Row::new(row_index, record(value))
}

/// Rows indexed 1.. from a `json!` array of objects.
///
/// # Panics
///
/// Panics if `value` is not an array of objects.
#[must_use]
pub fn rows(value: Value) -> Vec<Row> {
    match value {
        Value::Array(items) => index_records(items.into_iter().map(record).collect()),
        other => panic!("expected a JSON array, got {other}"),
    }
}

#[derive(Debug, Default)]
struct Script {
    records: HashMap<DatasetKey, Vec<Record>>,
    failures: HashMap<DatasetKey, HydrantError>,
    fetches: HashMap<DatasetKey, usize>,
    writes: Vec<(DatasetKey, RowMutation)>,
}

/// An in-memory remote store whose contents and failures are set by the test.
///
/// Clones share state, so a test can keep a handle after moving a clone into
/// a fetcher.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    script: Arc<Mutex<Script>>,
}

impl ScriptedSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Serve `records` for `key` and clear any scripted failure.
    pub fn set_records(&self, key: DatasetKey, records: Vec<Record>) {
        let mut script = self.script();
        script.failures.remove(&key);
        script.records.insert(key, records);
    }

    /// Fail every fetch of `key` with `error` until records are set again.
    pub fn fail_with(&self, key: DatasetKey, error: HydrantError) {
        self.script().failures.insert(key, error);
    }

    /// Number of fetches of `key` so far.
    #[must_use]
    pub fn fetch_count(&self, key: DatasetKey) -> usize {
        self.script().fetches.get(&key).copied().unwrap_or(0)
    }

    /// Every mutation received, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<(DatasetKey, RowMutation)> {
        self.script().writes.clone()
    }

    fn record_write(&self, key: DatasetKey, mutation: RowMutation) {
        self.script().writes.push((key, mutation));
    }
}

impl DatasetSource for ScriptedSource {
    async fn fetch_records(
        &self,
        key: DatasetKey,
        _credential: &Credential,
    ) -> Result<Vec<Record>, HydrantError> {
        let mut script = self.script();
        *script.fetches.entry(key).or_default() += 1;
        if let Some(error) = script.failures.get(&key) {
            return Err(error.clone());
        }
        Ok(script.records.get(&key).cloned().unwrap_or_default())
    }
}

impl DatasetSink for ScriptedSource {
    async fn append_row(
        &self,
        key: DatasetKey,
        _credential: &Credential,
        values: &Record,
    ) -> Result<(), HydrantError> {
        self.record_write(key, RowMutation::Append(values.clone()));
        Ok(())
    }

    async fn update_row(
        &self,
        key: DatasetKey,
        _credential: &Credential,
        row_index: usize,
        values: &Record,
    ) -> Result<(), HydrantError> {
        self.record_write(key, RowMutation::Update(Row::new(row_index, values.clone())));
        Ok(())
    }

    async fn delete_row(
        &self,
        key: DatasetKey,
        _credential: &Credential,
        row_index: usize,
    ) -> Result<(), HydrantError> {
        self.record_write(key, RowMutation::Delete(row_index));
        Ok(())
    }
}
