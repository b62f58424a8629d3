//! Dependency-ordered hydration.
//!
//! Hydration is one hop per call, so a task only sees its project's owner if
//! the projects were hydrated before the tasks and the hydrated projects were
//! passed in. This module makes that order explicit instead of leaving it to
//! each caller:
//!
//! - [`HydrationPlan`] orders datasets so that every dataset comes after the
//!   datasets it references, and reports reference cycles
//! - [`HydrationSession`] owns the dataset map, remembers which datasets are
//!   hydrated, and checks every request against that record

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

use super::Hydrator;
use crate::core::HydrantError;
use crate::dataset::{DatasetKey, DatasetMap, Row};
use crate::registry::Registry;

/// What to do when datasets are hydrated out of dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderPolicy {
    /// Log a warning and hydrate against whatever rows are present.
    #[default]
    Warn,
    /// Refuse with [`HydrantError::UnhydratedDependency`] or
    /// [`HydrantError::HydrationCycle`].
    ///
    /// The builtin registry has a `PEOPLE` / `BUSINESS_UNITS` cycle that
    /// every other dataset reaches, so with it `hydrate_all` always fails.
    /// Use this policy with registries that have no cycles.
    Reject,
}

/// Hydration order for a set of datasets.
///
/// Each stage is one strongly connected component of the reference graph.
/// Single-dataset stages (including self-referencing ones) are ordinary;
/// multi-dataset stages are reference cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydrationPlan {
    stages: Vec<Vec<DatasetKey>>,
}

impl HydrationPlan {
    /// Order `keys` so referenced datasets come first.
    ///
    /// Only references between datasets in `keys` count; self references
    /// never constrain the order.
    pub fn build(registry: &Registry, keys: impl IntoIterator<Item = DatasetKey>) -> Self {
        let keys: BTreeSet<DatasetKey> = keys.into_iter().collect();

        let mut graph: DiGraph<DatasetKey, ()> = DiGraph::new();
        let nodes: HashMap<DatasetKey, NodeIndex> =
            keys.iter().map(|key| (*key, graph.add_node(*key))).collect();

        for key in &keys {
            for target in registry.targets_of(*key) {
                if target != *key {
                    if let Some(&target_node) = nodes.get(&target) {
                        graph.add_edge(nodes[key], target_node, ());
                    }
                }
            }
        }

        // Tarjan yields components in reverse topological order: with edges
        // pointing from a dataset to the datasets it references, referenced
        // datasets come out first.
        let stages = tarjan_scc(&graph)
            .into_iter()
            .map(|component| {
                let mut stage: Vec<DatasetKey> =
                    component.into_iter().map(|node| graph[node]).collect();
                stage.sort();
                stage
            })
            .collect();

        Self {
            stages,
        }
    }

    /// Stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[Vec<DatasetKey>] {
        &self.stages
    }

    /// All datasets in execution order.
    #[must_use]
    pub fn order(&self) -> Vec<DatasetKey> {
        self.stages.iter().flatten().copied().collect()
    }

    /// Stages that are reference cycles.
    pub fn cycles(&self) -> impl Iterator<Item = &[DatasetKey]> {
        self.stages.iter().filter(|stage| stage.len() > 1).map(Vec::as_slice)
    }
}

fn cycle_chain(stage: &[DatasetKey]) -> String {
    let mut names: Vec<&str> = stage.iter().map(|key| key.as_str()).collect();
    if let Some(first) = names.first().copied() {
        names.push(first);
    }
    names.join(" -> ")
}

/// A set of datasets being hydrated in dependency order.
///
/// ```rust
/// use hydrant_cli::dataset::{DatasetKey, DatasetMap};
/// use hydrant_cli::hydration::{HydrationSession, OrderPolicy};
/// use hydrant_cli::registry::Registry;
///
/// # fn example(datasets: DatasetMap) -> Result<(), hydrant_cli::core::HydrantError> {
/// let mut session = HydrationSession::new(Registry::builtin(), datasets, OrderPolicy::Warn);
/// session.hydrate_all()?;
/// let tasks = session.get(DatasetKey::Tasks);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct HydrationSession<'r> {
    hydrator: Hydrator<'r>,
    datasets: DatasetMap,
    hydrated: BTreeSet<DatasetKey>,
    policy: OrderPolicy,
}

impl<'r> HydrationSession<'r> {
    /// Start a session over raw `datasets`.
    #[must_use]
    pub fn new(registry: &'r Registry, datasets: DatasetMap, policy: OrderPolicy) -> Self {
        Self {
            hydrator: Hydrator::new(registry),
            datasets,
            hydrated: BTreeSet::new(),
            policy,
        }
    }

    /// Whether `key` has been hydrated in this session.
    #[must_use]
    pub fn is_hydrated(&self, key: DatasetKey) -> bool {
        self.hydrated.contains(&key)
    }

    /// Current rows of `key`: hydrated if [`is_hydrated`](Self::is_hydrated), raw otherwise.
    #[must_use]
    pub fn get(&self, key: DatasetKey) -> Option<&[Row]> {
        self.datasets.get(&key).map(Vec::as_slice)
    }

    /// Every dataset in its current state.
    #[must_use]
    pub const fn datasets(&self) -> &DatasetMap {
        &self.datasets
    }

    /// Consume the session, returning the datasets in their current state.
    #[must_use]
    pub fn into_datasets(self) -> DatasetMap {
        self.datasets
    }

    /// Datasets referenced by `key` that are loaded, have references of their
    /// own, and are still raw.
    #[must_use]
    pub fn pending_dependencies(&self, key: DatasetKey) -> Vec<DatasetKey> {
        let registry = self.hydrator.registry();
        registry
            .targets_of(key)
            .into_iter()
            .filter(|target| {
                *target != key
                    && self.datasets.contains_key(target)
                    && registry.has_relationships(*target)
                    && !self.hydrated.contains(target)
            })
            .collect()
    }

    /// Hydrate one dataset against the current state of the others.
    ///
    /// Referencing a dataset that should have been hydrated first is a
    /// forward reference: it is logged under [`OrderPolicy::Warn`] and
    /// refused under [`OrderPolicy::Reject`]. Hydrating a dataset twice is a
    /// no-op.
    pub fn hydrate(&mut self, key: DatasetKey) -> Result<&[Row], HydrantError> {
        if !self.hydrated.contains(&key) {
            for dependency in self.pending_dependencies(key) {
                match self.policy {
                    OrderPolicy::Warn => warn!(
                        dataset = %key,
                        dependency = %dependency,
                        "hydrating before a referenced dataset; attached rows will be raw"
                    ),
                    OrderPolicy::Reject => {
                        return Err(HydrantError::UnhydratedDependency {
                            dataset: key.to_string(),
                            dependency: dependency.to_string(),
                        });
                    }
                }
            }
            self.hydrate_stage(&[key]);
        }
        Ok(self.get(key).unwrap_or(&[]))
    }

    /// Hydrate every loaded dataset in plan order.
    ///
    /// Members of a reference cycle are hydrated against each other's rows
    /// as they were before the cycle's stage (with a warning), or rejected
    /// with [`HydrantError::HydrationCycle`] under [`OrderPolicy::Reject`].
    pub fn hydrate_all(&mut self) -> Result<(), HydrantError> {
        let plan = HydrationPlan::build(self.hydrator.registry(), self.datasets.keys().copied());
        debug!(order = ?plan.order(), "hydration plan");

        for stage in plan.stages() {
            if stage.len() > 1 {
                let chain = cycle_chain(stage);
                match self.policy {
                    OrderPolicy::Warn => {
                        warn!(cycle = %chain, "reference cycle, hydrating members against raw rows");
                    }
                    OrderPolicy::Reject => {
                        return Err(HydrantError::HydrationCycle {
                            chain,
                        });
                    }
                }
            }
            self.hydrate_stage(stage);
        }

        info!(datasets = self.hydrated.len(), "hydration complete");
        Ok(())
    }

    /// Hydrate every not-yet-hydrated member of `stage` against one snapshot.
    fn hydrate_stage(&mut self, stage: &[DatasetKey]) {
        let results: Vec<(DatasetKey, Vec<Row>)> = stage
            .iter()
            .filter(|key| !self.hydrated.contains(*key))
            .filter_map(|key| {
                self.datasets
                    .get(key)
                    .map(|rows| (*key, self.hydrator.hydrate(rows, *key, &self.datasets)))
            })
            .collect();

        for (key, rows) in results {
            self.datasets.insert(key, rows);
        }
        self.hydrated.extend(stage.iter().copied());
    }
}
