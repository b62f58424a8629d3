//! `hydrant login` and `hydrant logout`.
//!
//! Both change which credential the next fetch uses, so both drop every
//! cached dataset: rows fetched with one credential must never be served to
//! another.

use anyhow::Result;
use clap::Args;
use tracing::info;

use super::CliConfig;
use super::common::CommandContext;

/// Store a credential for the table API.
#[derive(Debug, Args)]
pub struct LoginCommand {
    /// Bearer token for the table API
    #[arg(long, env = "HYDRANT_TOKEN", hide_env_values = true)]
    token: String,
}

impl LoginCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let mut ctx = CommandContext::load(cli).await?;
        let token = self.token.trim().to_string();
        if token.is_empty() {
            anyhow::bail!("The token is empty");
        }

        ctx.config.token = Some(token);
        ctx.config.save_to(&ctx.config_path).await?;
        let purged = ctx.purge_for_new_credential()?;
        info!(purged, "credential stored");

        println!("✅ Signed in; credential saved to {}", ctx.config_path.display());
        if ctx.config.api_base_url.is_none() {
            println!("   Set api_base_url in the config to fetch live data");
        }
        Ok(())
    }
}

/// Remove the stored credential and return to preview mode.
#[derive(Debug, Args)]
pub struct LogoutCommand;

impl LogoutCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let mut ctx = CommandContext::load(cli).await?;
        let signed_in = ctx.config.token.take().is_some();
        let purged = ctx.purge_for_new_credential()?;

        if signed_in {
            ctx.config.save_to(&ctx.config_path).await?;
            println!("✅ Signed out; removed {purged} cached datasets");
        } else {
            println!("Not signed in; removed {purged} cached datasets");
        }
        Ok(())
    }
}
