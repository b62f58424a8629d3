//! `hydrant fetch`: print the raw rows of one dataset.

use anyhow::Result;
use clap::Args;
use tracing::debug;

use super::CliConfig;
use super::common::{CommandContext, OutputFormat, print_rows};
use crate::dataset::DatasetKey;

/// Print a dataset as fetched, without hydration.
#[derive(Debug, Args)]
pub struct FetchCommand {
    /// Dataset to fetch (e.g. TASKS, people, business-units)
    dataset: String,

    /// Ignore a fresh cached copy and fetch from the remote store
    #[arg(long)]
    refresh: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

impl FetchCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let key: DatasetKey = self.dataset.parse()?;
        let ctx = CommandContext::load(cli).await?;
        ctx.note_preview();

        let fetcher = ctx.fetcher()?;
        let credential = ctx.credential();
        let rows = if self.refresh {
            fetcher.refresh(key, credential.as_ref()).await?
        } else {
            fetcher.fetch(key, credential.as_ref()).await?
        };
        debug!(dataset = %key, rows = rows.len(), "printing dataset");

        print_rows(&rows, self.format)
    }
}
