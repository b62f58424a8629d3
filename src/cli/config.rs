//! `hydrant config`: create and inspect the configuration file.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use super::CliConfig;
use super::common::CommandContext;
use crate::config::HydrantConfig;

/// Manage the configuration file.
#[derive(Debug, Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: Option<ConfigSubcommands>,
}

#[derive(Debug, Subcommand)]
enum ConfigSubcommands {
    /// Write an example configuration
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration, token masked (default)
    Show,

    /// Print the configuration file location
    Path,
}

impl ConfigCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        match self.command.unwrap_or(ConfigSubcommands::Show) {
            ConfigSubcommands::Init {
                force,
            } => Self::init(cli, force).await,
            ConfigSubcommands::Show => Self::show(cli).await,
            ConfigSubcommands::Path => {
                let path = match &cli.config_path {
                    Some(path) => path.clone(),
                    None => HydrantConfig::default_path()?,
                };
                println!("{}", path.display());
                Ok(())
            }
        }
    }

    async fn init(cli: &CliConfig, force: bool) -> Result<()> {
        let path = match &cli.config_path {
            Some(path) => path.clone(),
            None => HydrantConfig::default_path()?,
        };

        if tokio::fs::try_exists(&path).await.unwrap_or(false) && !force {
            println!("❌ Config already exists at: {}", path.display());
            println!("   Use --force to overwrite");
            return Ok(());
        }

        let config = HydrantConfig::init_example();
        config.save_to(&path).await?;

        println!("✅ Created config at: {}", path.display());
        println!("\n{}", "Example configuration:".bold());
        println!("{}", toml::to_string_pretty(&config)?);
        println!("{}", "Next steps:".yellow());
        println!("  1. Set api_base_url to your table API");
        println!("  2. Run 'hydrant login --token <TOKEN>'");
        Ok(())
    }

    async fn show(cli: &CliConfig) -> Result<()> {
        let ctx = CommandContext::load(cli).await?;

        println!("{}", "Configuration".bold());
        println!("Location: {}\n", ctx.config_path.display());
        println!("{}", toml::to_string_pretty(&ctx.config.redacted())?);
        if ctx.credential().is_none() {
            println!("{}", "Mode: read-only preview (no token)".yellow());
        }
        Ok(())
    }
}
