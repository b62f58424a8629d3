//! Command-line interface for Hydrant.
//!
//! # Commands
//!
//! - `fetch` - Print the raw rows of a dataset
//! - `hydrate` - Fetch datasets with everything they reference and print them hydrated
//! - `schema` - List the editable columns of a dataset
//! - `relations` - Print the relationship registry and the hydration order
//! - `cache` - Inspect, clear or purge the dataset cache
//! - `login` / `logout` - Store or remove the credential (drops cached datasets)
//! - `config` - Create and inspect the configuration file
//!
//! # Global Options
//!
//! - `--verbose` / `-v` - Debug logging on stderr
//! - `--quiet` / `-q` - Errors only, no progress
//! - `--config` / `-c` - Configuration file to use
//! - `--no-progress` - Disable progress bars
//!
//! Without a credential every command runs against the built-in preview
//! datasets, so `hydrant hydrate TASKS` works out of the box.
//!
//! # Output
//!
//! Data goes to stdout (JSON by default); logs, progress and notes go to
//! stderr, so output can be piped into other tools.

mod auth;
mod cache;
pub mod common;
mod config;
mod fetch;
mod hydrate;
mod relations;
mod schema;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Settings derived from the global flags, passed to every command.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log filter for the crate (`None` for errors only)
    pub log_level: Option<String>,

    /// Whether progress bars are suppressed
    pub no_progress: bool,

    /// Configuration file override
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether commands may draw progress bars.
    #[must_use]
    pub const fn show_progress(&self) -> bool {
        !self.no_progress
    }

    /// The `tracing` filter directive matching the verbosity flags.
    #[must_use]
    pub fn log_filter(&self) -> String {
        match &self.log_level {
            Some(level) => format!("hydrant_cli={level},hydrant={level}"),
            None => "error".to_string(),
        }
    }
}

/// Hydrant: cached, relationship-aware views over remote tables.
#[derive(Debug, Parser)]
#[command(
    name = "hydrant",
    about = "Fetch, cache and hydrate related datasets from a remote table store",
    version,
    long_about = "Hydrant fetches tabular datasets from a remote table API, caches them locally with a \
                  time-to-live, and hydrates foreign-key columns with the display values and rows they \
                  reference."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, env = "HYDRANT_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Disable progress bars
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the raw rows of a dataset
    Fetch(fetch::FetchCommand),

    /// Fetch and hydrate datasets
    Hydrate(hydrate::HydrateCommand),

    /// List the editable columns of a dataset
    Schema(schema::SchemaCommand),

    /// Print the relationship registry
    Relations(relations::RelationsCommand),

    /// Manage the dataset cache
    Cache(cache::CacheCommand),

    /// Store a credential and drop cached datasets
    Login(auth::LoginCommand),

    /// Remove the credential and drop cached datasets
    Logout(auth::LogoutCommand),

    /// Manage the configuration file
    Config(config::ConfigCommand),
}

impl Cli {
    /// Run the parsed command with settings derived from the global flags.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Derive [`CliConfig`] from the global flags.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("info".to_string())
        };

        CliConfig {
            log_level,
            no_progress: self.no_progress || self.quiet,
            config_path: self.config.clone(),
        }
    }

    /// Run the parsed command with explicit settings.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        match self.command {
            Commands::Fetch(cmd) => cmd.execute(&config).await,
            Commands::Hydrate(cmd) => cmd.execute(&config).await,
            Commands::Schema(cmd) => cmd.execute(&config).await,
            Commands::Relations(cmd) => cmd.execute(),
            Commands::Cache(cmd) => cmd.execute(&config).await,
            Commands::Login(cmd) => cmd.execute(&config).await,
            Commands::Logout(cmd) => cmd.execute(&config).await,
            Commands::Config(cmd) => cmd.execute(&config).await,
        }
    }
}
