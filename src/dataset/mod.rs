//! Dataset identifiers and row records.
//!
//! Rows are free-form, string-keyed records whose schema is discovered at
//! runtime: there is no declared column list, only the keys present on the
//! first row of a snapshot. The hydration core never looks at the schema; it
//! only reads the columns named by the relationship registry.
//!
//! # Row shape
//!
//! A [`Row`] serializes flat, with its synthetic index alongside the columns:
//!
//! ```json
//! { "rowIndex": 1, "task_id": "task_001", "Project id": "proj_003" }
//! ```
//!
//! The index is assigned by fetch order (1-based). It is stable within one
//! snapshot but not across remote mutations that reorder or delete rows.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::constants::ROW_INDEX_FIELD;
use crate::core::HydrantError;

/// A raw record as delivered by a dataset source, before indexing.
pub type Record = Map<String, Value>;

/// Every dataset that is currently available, keyed by dataset.
///
/// This is the `allDatasets` input of hydration: lookups for related rows are
/// built from it.
pub type DatasetMap = HashMap<DatasetKey, Vec<Row>>;

/// Identifier of a dataset (one remote table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetKey {
    /// Projects and their owners, business units and clients
    Projects,
    /// Tasks, assigned to people and grouped under projects
    Tasks,
    /// People, with managers and business units
    People,
    /// Business units
    BusinessUnits,
    /// Growth flywheels
    Flywheels,
    /// Marketing campaigns
    Campaigns,
    /// Client accounts
    Clients,
}

impl DatasetKey {
    /// All dataset keys in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Projects,
        Self::Tasks,
        Self::People,
        Self::BusinessUnits,
        Self::Flywheels,
        Self::Campaigns,
        Self::Clients,
    ];

    /// The canonical string form, as used in cache keys and remote table names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Projects => "PROJECTS",
            Self::Tasks => "TASKS",
            Self::People => "PEOPLE",
            Self::BusinessUnits => "BUSINESS_UNITS",
            Self::Flywheels => "FLYWHEELS",
            Self::Campaigns => "CAMPAIGNS",
            Self::Clients => "CLIENTS",
        }
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKey {
    type Err = HydrantError;

    /// Parses case-insensitively; `-` is accepted in place of `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_").to_ascii_uppercase();
        Self::ALL.into_iter().find(|key| key.as_str() == wanted).ok_or_else(|| {
            HydrantError::UnknownDataset {
                name: s.to_string(),
            }
        })
    }
}

/// One entity instance from one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// 1-based position in the fetch that produced this row.
    #[serde(rename = "rowIndex")]
    pub row_index: usize,
    /// Column values in column order.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Row {
    /// Create a row from an index and its columns.
    ///
    /// A `rowIndex` column inside `fields` is dropped; the index is carried
    /// by `row_index` alone.
    #[must_use]
    pub fn new(row_index: usize, mut fields: Map<String, Value>) -> Self {
        fields.remove(ROW_INDEX_FIELD);
        Self {
            row_index,
            fields,
        }
    }

    /// Value of a column, if present.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Whether the row has a column with this name.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Set a column, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(field.into(), value)
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// The row as a JSON object, including its `rowIndex`.
    ///
    /// This is the shape used when a row is attached to another row.
    #[must_use]
    pub fn to_object(&self) -> Value {
        let mut object = Map::with_capacity(self.fields.len() + 1);
        object.insert(ROW_INDEX_FIELD.to_string(), Value::from(self.row_index));
        for (key, value) in &self.fields {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }
}

/// Attach 1-based row indices to records in fetch order.
#[must_use]
pub fn index_records(records: Vec<Record>) -> Vec<Row> {
    records.into_iter().enumerate().map(|(i, record)| Row::new(i + 1, record)).collect()
}

/// Infer the column list of a dataset from the keys of its first row.
///
/// Rows share one schema within a snapshot, so the first row is
/// representative. An empty dataset has no columns.
#[must_use]
pub fn infer_columns(rows: &[Row]) -> Vec<String> {
    rows.first().map(|row| row.columns().map(str::to_string).collect()).unwrap_or_default()
}

/// Columns a user can edit: the inferred schema minus hydration-derived fields.
#[must_use]
pub fn editable_columns(rows: &[Row], registry: &crate::registry::Registry) -> Vec<String> {
    rows.first()
        .map(|row| {
            row.fields
                .iter()
                .filter(|(key, value)| !crate::hydration::is_derived_field(registry, key, value))
                .map(|(key, _)| key.clone())
                .collect()
        })
        .unwrap_or_default()
}
