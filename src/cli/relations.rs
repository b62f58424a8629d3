//! `hydrant relations`: print the relationship registry.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde_json::json;

use crate::dataset::DatasetKey;
use crate::hydration::{HydrationPlan, resolved_field_name};
use crate::registry::Registry;

/// List the references hydration follows.
#[derive(Debug, Args)]
pub struct RelationsCommand {
    /// Only show references from this dataset
    #[arg(long)]
    dataset: Option<String>,

    /// Print as JSON
    #[arg(long)]
    json: bool,
}

impl RelationsCommand {
    pub fn execute(self) -> Result<()> {
        let filter: Option<DatasetKey> = self.dataset.as_deref().map(str::parse::<DatasetKey>).transpose()?;
        let registry = Registry::builtin();
        let relationships: Vec<_> = registry
            .relationships()
            .iter()
            .filter(|rel| filter.is_none_or(|key| rel.source == key))
            .collect();

        if self.json {
            let entries: Vec<_> = relationships
                .iter()
                .map(|rel| {
                    json!({
                        "source": rel.source,
                        "source_field": rel.source_field,
                        "target": rel.target,
                        "target_field": rel.target_field,
                        "display_field": rel.display_field,
                        "resolved_field": resolved_field_name(rel.source_field),
                        "attachment": registry.attachment_name(rel.source_field),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
            return Ok(());
        }

        for rel in &relationships {
            let attachment = registry
                .attachment_name(rel.source_field)
                .map(|name| format!(" (attaches {name})").dimmed().to_string())
                .unwrap_or_default();
            println!(
                "{}.{} -> {}.{} shows {}{attachment}",
                rel.source.to_string().cyan(),
                rel.source_field,
                rel.target.to_string().cyan(),
                rel.target_field,
                rel.display_field.bold(),
            );
        }

        if filter.is_none() {
            let plan = HydrationPlan::build(registry, DatasetKey::ALL);
            let order: Vec<String> = plan
                .stages()
                .iter()
                .map(|stage| {
                    let names: Vec<&str> = stage.iter().map(|key| key.as_str()).collect();
                    if names.len() > 1 { format!("[{}]", names.join(" ")) } else { names.join("") }
                })
                .collect();
            println!("\n{} {}", "Hydration order:".bold(), order.join(", "));
            for cycle in plan.cycles() {
                let names: Vec<&str> = cycle.iter().map(|key| key.as_str()).collect();
                println!("{} reference cycle between {}", "warning:".yellow().bold(), names.join(" and "));
            }
        }
        Ok(())
    }
}
