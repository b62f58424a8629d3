//! `hydrant schema`: list the editable columns of a dataset.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::CliConfig;
use super::common::CommandContext;
use crate::dataset::{DatasetKey, editable_columns};
use crate::registry::Registry;

/// Show the columns of a dataset, inferred from its first row.
#[derive(Debug, Args)]
pub struct SchemaCommand {
    /// Dataset to inspect
    dataset: String,

    /// Print the columns as a JSON array
    #[arg(long)]
    json: bool,
}

impl SchemaCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let key: DatasetKey = self.dataset.parse()?;
        let ctx = CommandContext::load(cli).await?;
        ctx.note_preview();

        let rows = ctx.fetcher()?.fetch(key, ctx.credential().as_ref()).await?;
        let registry = Registry::builtin();
        let columns = editable_columns(&rows, registry);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&columns)?);
            return Ok(());
        }

        if columns.is_empty() {
            println!("{key} is empty; no columns can be inferred");
            return Ok(());
        }

        println!("{}", format!("{key} ({} rows)", rows.len()).bold());
        for column in &columns {
            let reference = registry
                .relationships_for(key)
                .find(|rel| rel.source_field == column.as_str())
                .map(|rel| format!(" -> {}.{}", rel.target, rel.target_field).dimmed().to_string())
                .unwrap_or_default();
            println!("  {column}{reference}");
        }
        Ok(())
    }
}
