//! HTTP client for a spreadsheet-style table API.
//!
//! Tables are read as a grid whose first row holds the column names:
//!
//! ```json
//! { "values": [["task_id", "status"], ["task_001", "Open"], ["task_002"]] }
//! ```
//!
//! Short rows are padded with `""`. Rows are written as objects keyed by
//! column name. Sheet row numbers count the header, so data row `n` (1-based
//! `rowIndex`) lives at sheet row `n + 1`.
//!
//! | Operation | Request                                  |
//! |-----------|------------------------------------------|
//! | read      | `GET    {base}/tables/{table}/values`    |
//! | append    | `POST   {base}/tables/{table}/rows`      |
//! | update    | `PUT    {base}/tables/{table}/rows/{n}`  |
//! | delete    | `DELETE {base}/tables/{table}/rows/{n}`  |

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{debug, warn};

use super::{Credential, DatasetSink, DatasetSource, cell_text};
use crate::constants::{
    DEFAULT_REQUEST_TIMEOUT, MAX_BACKOFF_DELAY_MS, MAX_FETCH_RETRIES, STARTING_BACKOFF_DELAY_MS,
};
use crate::core::HydrantError;
use crate::dataset::{DatasetKey, Record};

#[derive(Debug, Deserialize)]
struct ValuesPayload {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Turn a `{"values": [[header...], [cell...]...]}` payload into records.
///
/// Missing trailing cells become `""`; cells beyond the header are dropped.
/// An empty grid or a header-only grid yields no records.
///
/// # Errors
///
/// Fails when the payload is not a values grid or a header is not a string.
pub fn parse_values_payload(dataset: DatasetKey, body: &str) -> Result<Vec<Record>, HydrantError> {
    let payload: ValuesPayload =
        serde_json::from_str(body).map_err(|e| HydrantError::FetchFailed {
            dataset: dataset.to_string(),
            message: format!("unexpected response body: {e}"),
            transient: false,
        })?;

    let mut grid = payload.values.into_iter();
    let Some(header) = grid.next() else {
        return Ok(Vec::new());
    };
    let columns: Vec<String> = header
        .into_iter()
        .map(|cell| match cell {
            Value::String(name) => Ok(name),
            other => Err(HydrantError::FetchFailed {
                dataset: dataset.to_string(),
                message: format!("column header is not text: {other}"),
                transient: false,
            }),
        })
        .collect::<Result<_, _>>()?;

    Ok(grid
        .map(|cells| {
            let mut cells = cells.into_iter();
            columns
                .iter()
                .map(|column| (column.clone(), cells.next().unwrap_or_else(|| Value::String(String::new()))))
                .collect()
        })
        .collect())
}

fn classify_status(dataset: DatasetKey, status: StatusCode, body: &str) -> HydrantError {
    let message = if body.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", body.trim())
    };
    let dataset = dataset.to_string();
    match status {
        StatusCode::UNAUTHORIZED => HydrantError::AuthenticationFailed {
            dataset,
            message,
        },
        StatusCode::FORBIDDEN => HydrantError::PermissionDenied {
            dataset,
            message,
        },
        _ => HydrantError::FetchFailed {
            dataset,
            message,
            transient: status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
        },
    }
}

fn classify_transport(dataset: DatasetKey, error: &reqwest::Error) -> HydrantError {
    HydrantError::FetchFailed {
        dataset: dataset.to_string(),
        message: error.to_string(),
        transient: error.is_timeout() || error.is_connect() || error.is_request(),
    }
}

/// [`DatasetSource`] and [`DatasetSink`] over the table HTTP API.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    base_url: String,
    tables: HashMap<DatasetKey, String>,
    retries: usize,
}

impl HttpSource {
    /// A client for the API at `base_url` with the default timeout.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>) -> Result<Self, HydrantError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// A client whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be constructed.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, HydrantError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hydrant/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HydrantError::ConfigError {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tables: HashMap::new(),
            retries: MAX_FETCH_RETRIES,
        })
    }

    /// Remote table names for datasets whose table is not named after the key.
    #[must_use]
    pub fn with_tables(mut self, tables: HashMap<DatasetKey, String>) -> Self {
        self.tables = tables;
        self
    }

    /// Retry transient read failures at most `retries` times.
    #[must_use]
    pub const fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Remote table name of `key`.
    #[must_use]
    pub fn table_name(&self, key: DatasetKey) -> &str {
        self.tables.get(&key).map_or(key.as_str(), String::as_str)
    }

    fn table_url(&self, key: DatasetKey, suffix: &str) -> String {
        format!("{}/tables/{}/{suffix}", self.base_url, self.table_name(key))
    }

    async fn send(
        &self,
        key: DatasetKey,
        request: RequestBuilder,
        credential: &Credential,
    ) -> Result<String, HydrantError> {
        let response = request
            .bearer_auth(credential.secret())
            .send()
            .await
            .map_err(|e| classify_transport(key, &e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| classify_transport(key, &e))?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(classify_status(key, status, &body))
        }
    }

    async fn fetch_once(&self, key: DatasetKey, credential: &Credential) -> Result<Vec<Record>, HydrantError> {
        let url = self.table_url(key, "values");
        debug!(dataset = %key, %url, "requesting table values");
        let body = self.send(key, self.client.get(&url), credential).await?;
        parse_values_payload(key, &body)
    }

    fn row_url(&self, key: DatasetKey, row_index: usize) -> String {
        // Sheet rows count the header row
        self.table_url(key, &format!("rows/{}", row_index + 1))
    }
}

impl DatasetSource for HttpSource {
    async fn fetch_records(
        &self,
        key: DatasetKey,
        credential: &Credential,
    ) -> Result<Vec<Record>, HydrantError> {
        let strategy = ExponentialBackoff::from_millis(STARTING_BACKOFF_DELAY_MS)
            .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS))
            .take(self.retries);

        RetryIf::spawn(
            strategy,
            || self.fetch_once(key, credential),
            |e: &HydrantError| {
                let retry = e.is_transient();
                if retry {
                    warn!(dataset = %key, error = %e, "transient fetch failure, retrying");
                }
                retry
            },
        )
        .await
    }
}

impl DatasetSink for HttpSource {
    async fn append_row(
        &self,
        key: DatasetKey,
        credential: &Credential,
        values: &Record,
    ) -> Result<(), HydrantError> {
        let body = json!({ "values": text_values(values) });
        let request = self.client.post(self.table_url(key, "rows")).json(&body);
        self.send(key, request, credential).await.map(|_| ())
    }

    async fn update_row(
        &self,
        key: DatasetKey,
        credential: &Credential,
        row_index: usize,
        values: &Record,
    ) -> Result<(), HydrantError> {
        let body = json!({ "values": text_values(values) });
        let request = self.client.put(self.row_url(key, row_index)).json(&body);
        self.send(key, request, credential).await.map(|_| ())
    }

    async fn delete_row(
        &self,
        key: DatasetKey,
        credential: &Credential,
        row_index: usize,
    ) -> Result<(), HydrantError> {
        let request = self.client.delete(self.row_url(key, row_index));
        self.send(key, request, credential).await.map(|_| ())
    }
}

fn text_values(values: &Record) -> Record {
    values.iter().map(|(column, value)| (column.clone(), Value::String(cell_text(value)))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pads_short_rows() {
        let body = r#"{"values": [["task_id", "status", "notes"], ["t1", "Open"], ["t2", "Done", "ok", "extra"]]}"#;
        let records = parse_values_payload(DatasetKey::Tasks, body).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["notes"], Value::String(String::new()));
        assert_eq!(records[1]["notes"], "ok");
        assert_eq!(records[1].len(), 3);
        let columns: Vec<&str> = records[0].keys().map(String::as_str).collect();
        assert_eq!(columns, vec!["task_id", "status", "notes"]);
    }

    #[test]
    fn test_parse_empty_grids() {
        assert!(parse_values_payload(DatasetKey::Tasks, r#"{"values": []}"#).unwrap().is_empty());
        assert!(parse_values_payload(DatasetKey::Tasks, "{}").unwrap().is_empty());
        assert!(parse_values_payload(DatasetKey::Tasks, r#"{"values": [["a"]]}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_bad_payloads() {
        assert!(matches!(
            parse_values_payload(DatasetKey::Tasks, "<html>"),
            Err(HydrantError::FetchFailed { transient: false, .. })
        ));
        assert!(parse_values_payload(DatasetKey::Tasks, r#"{"values": [[1, 2]]}"#).is_err());
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            classify_status(DatasetKey::Tasks, StatusCode::UNAUTHORIZED, ""),
            HydrantError::AuthenticationFailed { .. }
        ));
        assert!(matches!(
            classify_status(DatasetKey::Tasks, StatusCode::FORBIDDEN, "nope"),
            HydrantError::PermissionDenied { .. }
        ));
        assert!(classify_status(DatasetKey::Tasks, StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(classify_status(DatasetKey::Tasks, StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(!classify_status(DatasetKey::Tasks, StatusCode::NOT_FOUND, "").is_transient());
    }

    #[test]
    fn test_urls_and_table_names() {
        let mut tables = HashMap::new();
        tables.insert(DatasetKey::People, "Team Directory".to_string());
        let source = HttpSource::new("https://tables.example.com/api/").unwrap().with_tables(tables);

        assert_eq!(source.table_name(DatasetKey::People), "Team Directory");
        assert_eq!(source.table_name(DatasetKey::Tasks), "TASKS");
        assert_eq!(
            source.table_url(DatasetKey::Tasks, "values"),
            "https://tables.example.com/api/tables/TASKS/values"
        );
        assert_eq!(source.row_url(DatasetKey::Tasks, 1), "https://tables.example.com/api/tables/TASKS/rows/2");
    }
}
