//! Row hydration: resolving references into display values and related rows.
//!
//! Given one dataset's rows and every dataset currently available, the
//! [`Hydrator`] applies each [`Relationship`] whose source is that dataset and
//! returns augmented copies of the rows:
//!
//! - `"<field>_resolved"`: the display values of every referenced row that
//!   was found, joined with `", "`
//! - `<attachment>`: for single-valued references with an attachment name,
//!   the whole referenced row as a nested object
//!
//! The original column is never touched, so an unresolved reference simply
//! degrades to showing its raw key.
//!
//! # Performance
//!
//! Target rows are indexed once per `hydrate` call and target dataset, so a
//! call costs O(rows + targets) instead of O(rows x targets).
//!
//! # One hop
//!
//! Attached rows are taken as they are found in the dataset map; they are not
//! hydrated recursively. Multi-hop chains (task -> project -> business unit)
//! are built by hydrating datasets in dependency order and feeding the
//! hydrated rows forward, which is what [`HydrationSession`] does.
//!
//! # Examples
//!
//! ```rust
//! use hydrant_cli::dataset::{DatasetKey, DatasetMap, Row};
//! use hydrant_cli::hydration::hydrate;
//! use serde_json::json;
//!
//! let row = |index, value: serde_json::Value| {
//!     Row::new(index, value.as_object().cloned().unwrap_or_default())
//! };
//!
//! let mut all = DatasetMap::new();
//! all.insert(DatasetKey::People, vec![row(1, json!({"User_id": "user_003", "full_name": "Arun Nair"}))]);
//!
//! let tasks = vec![row(1, json!({"task_id": "task_001", "assignee_User_id": "user_003"}))];
//! let hydrated = hydrate(&tasks, DatasetKey::Tasks, &all);
//!
//! assert_eq!(hydrated[0].get("assignee_User_id_resolved"), Some(&json!("Arun Nair")));
//! assert_eq!(hydrated[0].get("assignee").and_then(|a| a.get("full_name")), Some(&json!("Arun Nair")));
//! ```

mod normalize;
mod plan;

pub use normalize::{normalize_id, normalize_text};
pub use plan::{HydrationPlan, HydrationSession, OrderPolicy};

use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::constants::{DISPLAY_SEPARATOR, FOREIGN_KEY_DELIMITER, RESOLVED_SUFFIX};
use crate::dataset::{DatasetKey, DatasetMap, Row};
use crate::registry::{Registry, Relationship};
use normalize::scalar_text;

/// Name of the display-value field derived from `source_field`.
#[must_use]
pub fn resolved_field_name(source_field: &str) -> String {
    format!("{source_field}{RESOLVED_SUFFIX}")
}

/// Index of one target dataset: normalized key -> row.
type Lookup<'a> = HashMap<String, &'a Row>;

/// Applies registry relationships to dataset rows.
#[derive(Debug, Clone, Copy)]
pub struct Hydrator<'r> {
    registry: &'r Registry,
}

impl Hydrator<'static> {
    /// A hydrator over the builtin registry.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(Registry::builtin())
    }
}

impl<'r> Hydrator<'r> {
    /// Create a hydrator over `registry`.
    #[must_use]
    pub const fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
        }
    }

    /// The registry driving this hydrator.
    #[must_use]
    pub const fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Hydrate `rows` of dataset `key` against every dataset in `all`.
    ///
    /// Returns new rows; the input is never modified. Rows of a dataset
    /// without relationships come back as value-equal copies. Relationships
    /// whose target dataset is missing from `all` are skipped.
    ///
    /// `rows` may be the same snapshot as `all[key]`: self references (a
    /// person's manager) are resolved against the rows as given, in a single
    /// pass.
    #[must_use]
    pub fn hydrate(&self, rows: &[Row], key: DatasetKey, all: &DatasetMap) -> Vec<Row> {
        let relationships: Vec<&Relationship> = self.registry.relationships_for(key).collect();
        if relationships.is_empty() {
            trace!(dataset = %key, "no relationships, passing rows through");
            return rows.to_vec();
        }

        let lookups = build_lookups(&relationships, all);

        rows.iter()
            .map(|row| {
                let mut hydrated = row.clone();
                for relationship in &relationships {
                    let lookup_key = (relationship.target, relationship.target_field);
                    if let Some(lookup) = lookups.get(&lookup_key) {
                        self.apply(row, &mut hydrated, relationship, lookup);
                    }
                }
                hydrated
            })
            .collect()
    }

    fn apply(&self, source: &Row, hydrated: &mut Row, relationship: &Relationship, lookup: &Lookup<'_>) {
        let Some(raw) = source.get(relationship.source_field).and_then(scalar_text) else {
            return;
        };

        let parts = split_keys(&raw);
        if parts.is_empty() {
            return;
        }

        let matches: Vec<&Row> = parts
            .iter()
            .filter_map(|part| {
                let normalized = normalize_text(part);
                if normalized.is_empty() {
                    None
                } else {
                    lookup.get(&normalized).copied()
                }
            })
            .collect();

        if matches.is_empty() {
            trace!(field = relationship.source_field, raw = %raw, "reference left unresolved");
            return;
        }

        let display: Vec<String> = matches
            .iter()
            .filter_map(|target| target.get(relationship.display_field).and_then(scalar_text))
            .collect();
        if !display.is_empty() {
            hydrated.insert(
                resolved_field_name(relationship.source_field),
                Value::String(display.join(DISPLAY_SEPARATOR)),
            );
        }

        if parts.len() == 1 && matches.len() == 1 {
            if let Some(name) = self.registry.attachment_name(relationship.source_field) {
                let occupied_by_column = hydrated.get(name).is_some_and(is_occupied_cell);
                if occupied_by_column {
                    debug!(
                        attachment = name,
                        "row already has a column named like the attachment, not attaching"
                    );
                } else {
                    hydrated.insert(name, matches[0].to_object());
                }
            }
        }
    }

    /// Remove every hydration-derived field from a row.
    ///
    /// Writes go to a store that knows nothing about hydration, so rows must
    /// be stripped of `*_resolved` fields and attached objects before they
    /// are sent back.
    #[must_use]
    pub fn strip_derived(&self, row: &Row) -> Row {
        let fields: Map<String, Value> = row
            .fields
            .iter()
            .filter(|(key, value)| !is_derived_field(self.registry, key, value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Row::new(row.row_index, fields)
    }
}

/// Hydrate with the builtin registry.
#[must_use]
pub fn hydrate(rows: &[Row], key: DatasetKey, all: &DatasetMap) -> Vec<Row> {
    Hydrator::builtin().hydrate(rows, key, all)
}

/// Strip hydration-derived fields using the builtin registry.
#[must_use]
pub fn strip_derived(row: &Row) -> Row {
    Hydrator::builtin().strip_derived(row)
}

/// Whether a field was added by hydration rather than fetched.
///
/// `<source_field>_resolved` fields and object values under an attachment
/// name are derived; a plain column that happens to end in `_resolved` is not.
#[must_use]
pub fn is_derived_field(registry: &Registry, key: &str, value: &Value) -> bool {
    if let Some(source_field) = key.strip_suffix(RESOLVED_SUFFIX) {
        if registry.is_source_field(source_field) {
            return true;
        }
    }
    value.is_object() && registry.is_attachment_name(key)
}

/// Whether a fetched cell holds data that an attachment must not replace.
///
/// Blank and null cells are free; so is an attachment from an earlier pass.
fn is_occupied_cell(value: &Value) -> bool {
    match value {
        Value::Null | Value::Object(_) => false,
        Value::String(text) => !text.trim().is_empty(),
        _ => true,
    }
}

/// Build one lookup per (target dataset, key column) referenced by `relationships`.
fn build_lookups<'a>(
    relationships: &[&Relationship],
    all: &'a DatasetMap,
) -> HashMap<(DatasetKey, &'static str), Lookup<'a>> {
    let mut lookups = HashMap::new();
    for relationship in relationships {
        let lookup_key = (relationship.target, relationship.target_field);
        if lookups.contains_key(&lookup_key) {
            continue;
        }
        let Some(target_rows) = all.get(&relationship.target) else {
            debug!(
                target = %relationship.target,
                field = relationship.source_field,
                "target dataset not loaded, skipping relationship"
            );
            continue;
        };

        let mut lookup: Lookup<'a> = HashMap::with_capacity(target_rows.len());
        for row in target_rows {
            let Some(raw) = row.get(relationship.target_field) else {
                continue;
            };
            let normalized = normalize_id(raw);
            if !normalized.is_empty() {
                lookup.insert(normalized, row);
            }
        }
        debug!(target = %relationship.target, entries = lookup.len(), "built lookup");
        lookups.insert(lookup_key, lookup);
    }
    lookups
}

/// Split a possibly multi-valued key cell into trimmed, non-empty parts.
fn split_keys(raw: &str) -> Vec<&str> {
    raw.split(FOREIGN_KEY_DELIMITER).map(str::trim).filter(|part| !part.is_empty()).collect()
}
