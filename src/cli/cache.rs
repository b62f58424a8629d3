//! `hydrant cache`: inspect and clear the dataset cache.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use super::CliConfig;
use super::common::CommandContext;
use crate::constants::DATASET_CACHE_PREFIX;

/// Manage the local dataset cache.
#[derive(Debug, Args)]
pub struct CacheCommand {
    #[command(subcommand)]
    command: Option<CacheSubcommands>,
}

#[derive(Debug, Subcommand)]
enum CacheSubcommands {
    /// Show the cache file and its entries (default)
    Info,

    /// Remove cached entries
    Clear {
        /// Only remove keys starting with this prefix
        #[arg(long, default_value = DATASET_CACHE_PREFIX)]
        prefix: String,
    },

    /// Remove expired entries only
    Purge,
}

impl CacheCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let ctx = CommandContext::load(cli).await?;
        let cache = ctx.cache()?;

        match self.command.unwrap_or(CacheSubcommands::Info) {
            CacheSubcommands::Info => {
                println!("{}", "Dataset Cache".bold());
                println!("Location: {}", ctx.config.cache_path()?.display());
                println!("TTL: {} minutes\n", ctx.config.cache_ttl_minutes);

                let entries = cache.entries();
                if entries.is_empty() {
                    println!("Cache is empty.");
                }
                for entry in entries {
                    let state = if entry.fresh { "fresh".green() } else { "expired".yellow() };
                    let expires = entry
                        .expires_at
                        .map_or_else(|| "unreadable".to_string(), |at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string());
                    println!("  {:<24} {:<8} expires {expires}  {} bytes", entry.key, state, entry.bytes);
                }
            }
            CacheSubcommands::Clear {
                prefix,
            } => {
                let removed = cache.try_invalidate_prefix(&prefix)?;
                println!("✅ Removed {removed} cache entries");
            }
            CacheSubcommands::Purge => {
                let removed = cache.purge_expired();
                println!("✅ Removed {removed} expired cache entries");
            }
        }
        Ok(())
    }
}
