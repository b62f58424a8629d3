//! `hydrant hydrate`: fetch datasets with everything they reference and
//! print them hydrated.

use anyhow::Result;
use clap::Args;
use std::collections::BTreeMap;

use super::CliConfig;
use super::common::{CommandContext, OutputFormat, parse_datasets, render_table};
use crate::dataset::{DatasetKey, Row};
use crate::hydration::{HydrationPlan, HydrationSession, OrderPolicy};
use crate::registry::Registry;

/// Fetch and hydrate datasets.
///
/// Referenced datasets are loaded too (transitively) and hydrated first, so
/// attached rows carry their own resolved values.
#[derive(Debug, Args)]
pub struct HydrateCommand {
    /// Datasets to print
    #[arg(required_unless_present = "all")]
    datasets: Vec<String>,

    /// Hydrate and print every dataset
    #[arg(long, conflicts_with = "datasets")]
    all: bool,

    /// Fail on reference cycles instead of hydrating cycle members against raw rows.
    ///
    /// The builtin registry links PEOPLE and BUSINESS_UNITS both ways and every
    /// dataset depends on them, so strict hydration always reports that cycle.
    #[arg(long)]
    strict: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

impl HydrateCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let requested = if self.all { DatasetKey::ALL.to_vec() } else { parse_datasets(&self.datasets)? };
        let ctx = CommandContext::load(cli).await?;
        ctx.note_preview();

        let registry = Registry::builtin();
        let needed: Vec<DatasetKey> = registry.closure(&requested).into_iter().collect();
        let plan = HydrationPlan::build(registry, needed.iter().copied());
        tracing::debug!(order = ?plan.order(), "hydrating");

        let fetcher = ctx.fetcher()?;
        let credential = ctx.credential();
        let progress = ctx.progress(needed.len() as u64);
        let datasets = fetcher
            .fetch_many_with(&needed, credential.as_ref(), |key| {
                progress.set_message(key.to_string());
                progress.inc(1);
            })
            .await;
        progress.finish_and_clear();
        let datasets = datasets?;

        let policy = if self.strict { OrderPolicy::Reject } else { ctx.config.order_policy };
        let mut session = HydrationSession::new(registry, datasets, policy);
        session.hydrate_all()?;

        let output: BTreeMap<DatasetKey, &[Row]> =
            requested.iter().filter_map(|key| session.get(*key).map(|rows| (*key, rows))).collect();

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
            OutputFormat::Table => {
                for (key, rows) in output {
                    println!("{key}");
                    print!("{}", render_table(rows));
                    println!();
                }
            }
        }
        Ok(())
    }
}
