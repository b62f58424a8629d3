//! Shared plumbing for CLI commands: loading configuration, building the
//! fetcher, and printing rows.

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use super::CliConfig;
use crate::cache::{FileStore, TtlCache};
use crate::config::HydrantConfig;
use crate::core::HydrantError;
use crate::dataset::{DatasetKey, Record, Row, infer_columns};
use crate::fetch::{
    Credential, DatasetFetcher, DatasetSink, DatasetSource, HttpSource, credential_fingerprint,
};
use crate::utils::progress::ProgressBar;

/// How rows are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON on stdout
    #[default]
    Json,
    /// Aligned columns for reading in a terminal
    Table,
}

/// The remote store, or its absence when no API URL is configured.
#[derive(Debug, Clone)]
pub enum RemoteSource {
    Http(HttpSource),
    Unconfigured,
}

impl RemoteSource {
    fn unconfigured(key: DatasetKey) -> HydrantError {
        HydrantError::ConfigError {
            message: format!("cannot reach dataset {key}: api_base_url is not configured"),
        }
    }
}

impl DatasetSource for RemoteSource {
    async fn fetch_records(
        &self,
        key: DatasetKey,
        credential: &Credential,
    ) -> Result<Vec<Record>, HydrantError> {
        match self {
            Self::Http(http) => http.fetch_records(key, credential).await,
            Self::Unconfigured => Err(Self::unconfigured(key)),
        }
    }
}

impl DatasetSink for RemoteSource {
    async fn append_row(
        &self,
        key: DatasetKey,
        credential: &Credential,
        values: &Record,
    ) -> Result<(), HydrantError> {
        match self {
            Self::Http(http) => http.append_row(key, credential, values).await,
            Self::Unconfigured => Err(Self::unconfigured(key)),
        }
    }

    async fn update_row(
        &self,
        key: DatasetKey,
        credential: &Credential,
        row_index: usize,
        values: &Record,
    ) -> Result<(), HydrantError> {
        match self {
            Self::Http(http) => http.update_row(key, credential, row_index, values).await,
            Self::Unconfigured => Err(Self::unconfigured(key)),
        }
    }

    async fn delete_row(
        &self,
        key: DatasetKey,
        credential: &Credential,
        row_index: usize,
    ) -> Result<(), HydrantError> {
        match self {
            Self::Http(http) => http.delete_row(key, credential, row_index).await,
            Self::Unconfigured => Err(Self::unconfigured(key)),
        }
    }
}

/// Everything a command needs, resolved once from the CLI flags.
#[derive(Debug)]
pub struct CommandContext {
    pub config: HydrantConfig,
    pub config_path: PathBuf,
    pub show_progress: bool,
}

impl CommandContext {
    /// Load the configuration named by `--config`, or the default one.
    pub async fn load(cli: &CliConfig) -> Result<Self> {
        let config_path = match &cli.config_path {
            Some(path) => path.clone(),
            None => HydrantConfig::default_path()?,
        };
        let config = HydrantConfig::load_with_optional(Some(config_path.clone())).await?;
        Ok(Self {
            config,
            config_path,
            show_progress: cli.show_progress(),
        })
    }

    pub fn credential(&self) -> Option<Credential> {
        self.config.credential()
    }

    /// The cache backed by the configured cache file.
    pub fn cache(&self) -> Result<TtlCache> {
        let path = self.config.cache_path().context("Failed to resolve cache file location")?;
        Ok(TtlCache::new(Arc::new(FileStore::open(path))))
    }

    /// Fingerprint of the configured credential and API, `None` in preview.
    pub fn credential_fingerprint(&self) -> Option<String> {
        self.credential()
            .map(|credential| credential_fingerprint(&credential, self.config.api_base_url.as_deref()))
    }

    fn build_fetcher(&self) -> Result<DatasetFetcher<RemoteSource>> {
        let source = match &self.config.api_base_url {
            Some(url) => RemoteSource::Http(
                HttpSource::with_timeout(url.clone(), self.config.request_timeout())?
                    .with_tables(self.config.table_map()?),
            ),
            None => RemoteSource::Unconfigured,
        };
        Ok(DatasetFetcher::new(source, self.cache()?).with_ttl(self.config.cache_ttl_minutes))
    }

    /// A fetcher wired to the configured API, cache and TTL.
    ///
    /// Datasets cached under another credential or API are dropped first.
    pub fn fetcher(&self) -> Result<DatasetFetcher<RemoteSource>> {
        let fetcher = self.build_fetcher()?;
        fetcher
            .bind_credential(self.credential_fingerprint().as_deref())
            .context("Failed to drop datasets cached under a previous credential")?;
        Ok(fetcher)
    }

    /// Drop every cached dataset and record the current credential.
    ///
    /// Returns the number of snapshots removed.
    pub fn purge_for_new_credential(&self) -> Result<usize> {
        let fetcher = self.build_fetcher()?;
        let purged = fetcher.on_credential_change().context("Failed to drop cached datasets")?;
        fetcher
            .bind_credential(self.credential_fingerprint().as_deref())
            .context("Failed to record the new credential in the cache")?;
        Ok(purged)
    }

    /// A progress bar over `len` steps, hidden when progress is off.
    pub fn progress(&self, len: u64) -> ProgressBar {
        ProgressBar::new(len, self.show_progress)
    }

    /// Tell the user they are looking at demo data.
    pub fn note_preview(&self) {
        if self.credential().is_none() {
            eprintln!(
                "{} no credential configured, showing read-only preview data (run 'hydrant login')",
                "note:".yellow().bold()
            );
        }
    }
}

/// Parse dataset names given on the command line.
pub fn parse_datasets(names: &[String]) -> Result<Vec<DatasetKey>, HydrantError> {
    names.iter().map(|name| name.parse()).collect()
}

/// Print rows in the requested format.
pub fn print_rows(rows: &[Row], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(rows)?),
        OutputFormat::Table => print!("{}", render_table(rows)),
    }
    Ok(())
}

fn cell_display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Object(_) => "{…}".to_string(),
        other => other.to_string(),
    }
}

/// Render rows as aligned columns, `rowIndex` first.
#[must_use]
pub fn render_table(rows: &[Row]) -> String {
    let mut headers = vec!["#".to_string()];
    headers.extend(infer_columns(rows));

    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            let mut cells = vec![row.row_index.to_string()];
            cells.extend(headers[1..].iter().map(|column| row.get(column).map(cell_display).unwrap_or_default()));
            cells
        })
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            body.iter().map(|cells| cells[i].chars().count()).chain([header.chars().count()]).max().unwrap_or(0)
        })
        .collect();

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(&headers).bold().to_string());
    out.push('\n');
    for cells in &body {
        out.push_str(&line(cells));
        out.push('\n');
    }
    out
}
