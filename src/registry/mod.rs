//! Static relationship registry.
//!
//! The registry is the declarative half of hydration: a flat list of
//! [`Relationship`] descriptors saying which column of which dataset refers
//! to which key of which other dataset, and which target column is its
//! human-readable value. The hydration engine contains no per-entity join
//! code; adding a relationship is a one-line data change in
//! [`BUILTIN_RELATIONSHIPS`].
//!
//! Alongside the relationships sits the attachment map: the explicit list of
//! source fields whose single resolved target row is attached to the source
//! row as a nested object (for example `"Project id"` attaches `project`).
//! Fields without an entry only get the flat `<field>_resolved` display value.
//!
//! The builtin registry is compiled in and never mutated at runtime.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use crate::dataset::DatasetKey;

/// One foreign-key style reference between two datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relationship {
    /// Dataset whose rows hold the reference
    pub source: DatasetKey,
    /// Column on the source rows holding one or more comma-separated keys
    pub source_field: &'static str,
    /// Dataset being referenced
    pub target: DatasetKey,
    /// Key column on the target rows
    pub target_field: &'static str,
    /// Target column shown in place of the raw key
    pub display_field: &'static str,
}

impl Relationship {
    /// Build a relationship descriptor.
    #[must_use]
    pub const fn new(
        source: DatasetKey,
        source_field: &'static str,
        target: DatasetKey,
        target_field: &'static str,
        display_field: &'static str,
    ) -> Self {
        Self {
            source,
            source_field,
            target,
            target_field,
            display_field,
        }
    }

    /// Whether the relationship points back into its own dataset.
    #[must_use]
    pub fn is_self_reference(&self) -> bool {
        self.source == self.target
    }
}

use DatasetKey::{BusinessUnits, Campaigns, Clients, Flywheels, People, Projects, Tasks};

/// Every relationship known to the dashboard, in hydration order per dataset.
pub const BUILTIN_RELATIONSHIPS: &[Relationship] = &[
    Relationship::new(Tasks, "Project id", Projects, "project_id", "Project Name"),
    Relationship::new(Tasks, "assignee_User_id", People, "User_id", "full_name"),
    Relationship::new(Tasks, "reporter_User_id", People, "User_id", "full_name"),
    Relationship::new(Tasks, "collaborator_User_ids", People, "User_id", "full_name"),
    Relationship::new(Projects, "owner_User_id", People, "User_id", "full_name"),
    Relationship::new(Projects, "business_unit_id", BusinessUnits, "bu_id", "bu_name"),
    Relationship::new(Projects, "client_id", Clients, "client_id", "client_name"),
    Relationship::new(People, "manager_User_id", People, "User_id", "full_name"),
    Relationship::new(People, "business_unit_id", BusinessUnits, "bu_id", "bu_name"),
    Relationship::new(BusinessUnits, "owner_User_id", People, "User_id", "full_name"),
    Relationship::new(Flywheels, "owner_User_id", People, "User_id", "full_name"),
    Relationship::new(Flywheels, "business_unit_id", BusinessUnits, "bu_id", "bu_name"),
    Relationship::new(Campaigns, "Project id", Projects, "project_id", "Project Name"),
    Relationship::new(Campaigns, "flywheel_id", Flywheels, "flywheel_id", "flywheel_name"),
    Relationship::new(Campaigns, "owner_User_id", People, "User_id", "full_name"),
    Relationship::new(Clients, "account_manager_User_id", People, "User_id", "full_name"),
];

/// Source fields whose single resolved row is attached, and the attachment name.
pub const BUILTIN_ATTACHMENTS: &[(&str, &str)] = &[
    ("Project id", "project"),
    ("assignee_User_id", "assignee"),
    ("manager_User_id", "manager"),
    ("owner_User_id", "owner"),
    ("business_unit_id", "business_unit"),
    ("client_id", "client"),
    ("flywheel_id", "flywheel"),
    ("account_manager_User_id", "account_manager"),
];

static BUILTIN: LazyLock<Registry> =
    LazyLock::new(|| Registry::new(BUILTIN_RELATIONSHIPS.to_vec(), BUILTIN_ATTACHMENTS));

/// A queryable set of relationships plus the attachment map.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    relationships: Vec<Relationship>,
    attachments: HashMap<&'static str, &'static str>,
}

impl Registry {
    /// Build a registry from relationship descriptors and `(field, attachment)` pairs.
    #[must_use]
    pub fn new(relationships: Vec<Relationship>, attachments: &[(&'static str, &'static str)]) -> Self {
        Self {
            relationships,
            attachments: attachments.iter().copied().collect(),
        }
    }

    /// The compiled-in registry used by the dashboard.
    #[must_use]
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    /// All relationships, in declaration order.
    #[must_use]
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Relationships whose source is `source`, in declaration order.
    ///
    /// A dataset without relationships yields nothing, which makes hydrating
    /// it a no-op.
    pub fn relationships_for(&self, source: DatasetKey) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter().filter(move |rel| rel.source == source)
    }

    /// Whether any relationship starts at `source`.
    #[must_use]
    pub fn has_relationships(&self, source: DatasetKey) -> bool {
        self.relationships_for(source).next().is_some()
    }

    /// Distinct datasets referenced from `source`.
    #[must_use]
    pub fn targets_of(&self, source: DatasetKey) -> BTreeSet<DatasetKey> {
        self.relationships_for(source).map(|rel| rel.target).collect()
    }

    /// Every dataset reachable from `roots` through relationships, roots included.
    #[must_use]
    pub fn closure(&self, roots: &[DatasetKey]) -> BTreeSet<DatasetKey> {
        let mut seen: BTreeSet<DatasetKey> = BTreeSet::new();
        let mut pending: Vec<DatasetKey> = roots.to_vec();
        while let Some(key) = pending.pop() {
            if seen.insert(key) {
                pending.extend(self.targets_of(key));
            }
        }
        seen
    }

    /// Whether any relationship reads the column `field`.
    #[must_use]
    pub fn is_source_field(&self, field: &str) -> bool {
        self.relationships.iter().any(|rel| rel.source_field == field)
    }

    /// Name of the nested object attached for `source_field`, if any.
    #[must_use]
    pub fn attachment_name(&self, source_field: &str) -> Option<&'static str> {
        self.attachments.get(source_field).copied()
    }

    /// Whether `name` is used as an attachment field by any source field.
    #[must_use]
    pub fn is_attachment_name(&self, name: &str) -> bool {
        self.attachments.values().any(|attachment| *attachment == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationships_for_keeps_declaration_order() {
        let fields: Vec<&str> = Registry::builtin()
            .relationships_for(DatasetKey::Tasks)
            .map(|rel| rel.source_field)
            .collect();
        assert_eq!(
            fields,
            vec!["Project id", "assignee_User_id", "reporter_User_id", "collaborator_User_ids"]
        );
    }

    #[test]
    fn test_unregistered_dataset_yields_nothing() {
        let registry = Registry::new(Vec::new(), &[]);
        assert_eq!(registry.relationships_for(DatasetKey::Tasks).count(), 0);
        assert!(!registry.has_relationships(DatasetKey::Tasks));
        assert!(registry.targets_of(DatasetKey::Tasks).is_empty());
    }

    #[test]
    fn test_targets_are_distinct() {
        let targets = Registry::builtin().targets_of(DatasetKey::Tasks);
        assert_eq!(targets.into_iter().collect::<Vec<_>>(), vec![
            DatasetKey::Projects,
            DatasetKey::People
        ]);
    }

    #[test]
    fn test_closure_follows_references() {
        let closure = Registry::builtin().closure(&[DatasetKey::Tasks]);
        assert!(closure.contains(&DatasetKey::Tasks));
        assert!(closure.contains(&DatasetKey::Projects));
        assert!(closure.contains(&DatasetKey::People));
        // Projects reference clients and business units
        assert!(closure.contains(&DatasetKey::Clients));
        assert!(closure.contains(&DatasetKey::BusinessUnits));
        assert!(!closure.contains(&DatasetKey::Campaigns));
    }

    #[test]
    fn test_attachment_lookup() {
        let registry = Registry::builtin();
        assert_eq!(registry.attachment_name("Project id"), Some("project"));
        assert_eq!(registry.attachment_name("assignee_User_id"), Some("assignee"));
        assert_eq!(registry.attachment_name("reporter_User_id"), None);
        assert!(registry.is_attachment_name("manager"));
        assert!(!registry.is_attachment_name("manager_User_id"));
    }

    #[test]
    fn test_every_builtin_attachment_belongs_to_a_relationship() {
        let registry = Registry::builtin();
        for (field, _) in BUILTIN_ATTACHMENTS {
            assert!(
                registry.relationships().iter().any(|rel| rel.source_field == *field),
                "attachment for {field} has no relationship"
            );
        }
    }

    #[test]
    fn test_self_reference_detection() {
        let manager = Registry::builtin()
            .relationships_for(DatasetKey::People)
            .find(|rel| rel.source_field == "manager_User_id")
            .unwrap();
        assert!(manager.is_self_reference());
    }
}
