//! Configuration for Hydrant.
//!
//! A single user-level TOML file ([`HydrantConfig`]) carries the table API
//! location, the credential, cache settings and the hydration order policy.
//! See [`global`] for the file format and location rules.

pub mod global;

pub use global::HydrantConfig;
