//! User-level configuration for Hydrant.
//!
//! The configuration file holds the table API location, the credential and
//! cache settings. It lives outside any project directory because it carries
//! a secret.
//!
//! # Location
//!
//! - **Unix/macOS**: `~/.hydrant/config.toml`
//! - **Windows**: `%LOCALAPPDATA%\hydrant\config.toml`
//! - **Override**: `HYDRANT_CONFIG_PATH`, or `--config` on the command line
//!
//! # File Format
//!
//! ```toml
//! api_base_url = "https://tables.example.com/api"
//! token = "..."
//! cache_ttl_minutes = 5
//! cache_file = "~/.hydrant/cache.json"
//! request_timeout_secs = 30
//! order_policy = "warn"
//!
//! [tables]
//! PEOPLE = "Team Directory"
//! ```
//!
//! Every field is optional. Without a token the CLI runs in read-only
//! preview mode against the built-in demo datasets.
//!
//! # Security
//!
//! The file is written with `0600` permissions on Unix, and the token is
//! masked whenever the configuration is displayed.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::constants::{CONFIG_PATH_ENV, DEFAULT_CACHE_TTL_MINUTES, DEFAULT_REQUEST_TIMEOUT};
use crate::core::HydrantError;
use crate::dataset::DatasetKey;
use crate::fetch::Credential;
use crate::hydration::OrderPolicy;
use crate::utils::fs::expand_path;

const fn default_cache_ttl_minutes() -> u64 {
    DEFAULT_CACHE_TTL_MINUTES
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

/// Settings loaded from `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HydrantConfig {
    /// Base URL of the table API; required for signed-in use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,

    /// Bearer token. Absent means read-only preview.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Lifetime of cached dataset snapshots.
    #[serde(default = "default_cache_ttl_minutes")]
    pub cache_ttl_minutes: u64,

    /// Cache file location; `~` and `$VAR` are expanded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<String>,

    /// Per-request timeout for the table API.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How out-of-order hydration is handled.
    #[serde(default)]
    pub order_policy: OrderPolicy,

    /// Remote table names, keyed by dataset name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tables: BTreeMap<String, String>,
}

impl Default for HydrantConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            token: None,
            cache_ttl_minutes: DEFAULT_CACHE_TTL_MINUTES,
            cache_file: None,
            request_timeout_secs: default_request_timeout_secs(),
            order_policy: OrderPolicy::default(),
            tables: BTreeMap::new(),
        }
    }
}

impl HydrantConfig {
    /// Directory holding the config and the default cache file.
    ///
    /// # Errors
    ///
    /// Fails when the home (or local data) directory cannot be determined.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("hydrant")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".hydrant")
        };
        Ok(dir)
    }

    /// Location of the config file, honoring `HYDRANT_CONFIG_PATH`.
    ///
    /// # Errors
    ///
    /// Fails when no override is set and the home directory is unknown.
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load from the default location; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read or parsed.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(None).await
    }

    /// Load from `path` if given, else from the default location.
    ///
    /// A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read or parsed.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if fs::try_exists(&path).await.unwrap_or(false) {
            Self::load_from(&path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load from `path`, which must exist.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, parsed or validated.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .map_err(HydrantError::from)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write to `path`, creating parent directories, readable by the owner only.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be written or its permissions set.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        // The file holds a credential
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms = fs::metadata(path)
                .await
                .with_context(|| format!("Failed to read permissions for {}", path.display()))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms)
                .await
                .with_context(|| format!("Failed to set secure permissions on {}", path.display()))?;
        }

        Ok(())
    }

    /// Reject settings that cannot work.
    ///
    /// # Errors
    ///
    /// [`HydrantError::ConfigError`] for a zero timeout or an unknown dataset
    /// under `[tables]`.
    pub fn validate(&self) -> Result<(), HydrantError> {
        if self.request_timeout_secs == 0 {
            return Err(HydrantError::ConfigError {
                message: "request_timeout_secs must be greater than zero".to_string(),
            });
        }
        self.table_map().map(|_| ())
    }

    /// The credential, when a non-blank token is configured.
    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(Credential::new)
    }

    /// Remote table name of `key`; defaults to the key itself.
    #[must_use]
    pub fn table_name(&self, key: DatasetKey) -> String {
        self.table_map()
            .ok()
            .and_then(|mut tables| tables.remove(&key))
            .unwrap_or_else(|| key.as_str().to_string())
    }

    /// The `[tables]` section keyed by dataset.
    ///
    /// # Errors
    ///
    /// [`HydrantError::ConfigError`] when a key is not a dataset name.
    pub fn table_map(&self) -> Result<HashMap<DatasetKey, String>, HydrantError> {
        self.tables
            .iter()
            .map(|(name, table)| {
                name.parse::<DatasetKey>().map(|key| (key, table.clone())).map_err(|_| {
                    HydrantError::ConfigError {
                        message: format!("unknown dataset '{name}' in [tables]"),
                    }
                })
            })
            .collect()
    }

    /// Cache file location, expanded.
    ///
    /// # Errors
    ///
    /// Fails when the configured path references an undefined variable or
    /// the default directory cannot be determined.
    pub fn cache_path(&self) -> Result<PathBuf> {
        match &self.cache_file {
            Some(raw) => expand_path(raw),
            None => Ok(Self::config_dir()?.join("cache.json")),
        }
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// A copy safe to print: the token is masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.token = self.credential().map(|credential| credential.to_string());
        copy
    }

    /// Example configuration written by `hydrant config init`.
    #[must_use]
    pub fn init_example() -> Self {
        let mut tables = BTreeMap::new();
        tables.insert("PEOPLE".to_string(), "PEOPLE".to_string());
        Self {
            api_base_url: Some("https://tables.example.com/api".to_string()),
            token: None,
            cache_file: Some("~/.hydrant/cache.json".to_string()),
            tables,
            ..Self::default()
        }
    }
}
