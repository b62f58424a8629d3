//! Hydrant - cached, relationship-aware views over remote tables
//!
//! Hydrant fetches independently maintained tabular datasets (projects,
//! tasks, people, ...) from a remote table store, caches them locally with a
//! time-to-live, and *hydrates* them: every foreign-key column named in a
//! static relationship registry gains a human-readable `<field>_resolved`
//! value, and single references can attach the whole referenced row.
//!
//! # Architecture
//!
//! - [`dataset`]: dataset keys and rows with a runtime-inferred schema
//! - [`registry`]: the declarative list of relationships between datasets
//! - [`cache`]: TTL cache over an injected key/value store
//! - [`fetch`]: dataset sources and sinks, the cache-aware fetcher, preview data
//! - [`hydration`]: identifier normalization, one-hop hydration, and
//!   dependency-ordered hydration sessions
//! - [`config`]: user configuration file
//! - [`cli`]: the `hydrant` command-line interface
//!
//! # Example
//!
//! ```rust,no_run
//! use hydrant_cli::cache::TtlCache;
//! use hydrant_cli::dataset::DatasetKey;
//! use hydrant_cli::fetch::{DatasetFetcher, FixtureSource};
//! use hydrant_cli::hydration::{HydrationSession, OrderPolicy};
//! use hydrant_cli::registry::Registry;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let fetcher = DatasetFetcher::new(FixtureSource, TtlCache::in_memory());
//! let keys = [DatasetKey::Tasks, DatasetKey::Projects, DatasetKey::People];
//! let datasets = fetcher.fetch_many(&keys, None).await?;
//!
//! let mut session = HydrationSession::new(Registry::builtin(), datasets, OrderPolicy::Warn);
//! session.hydrate_all()?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod dataset;
pub mod fetch;
pub mod hydration;
pub mod registry;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
