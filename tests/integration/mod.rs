//! Integration test suite for Hydrant
//!
//! End-to-end tests of the public library API and the `hydrant` binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **hydration**: the tasks/projects/people scenario and dependency-ordered sessions
//! - **fetcher**: cache-first fetching, stale fallback and credential changes
//! - **http**: the table API client against a local one-shot HTTP server
//! - **cli**: the `hydrant` binary in preview mode

mod cli;
mod fetcher;
mod http;
mod hydration;
