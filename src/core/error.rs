//! Error handling for Hydrant
//!
//! This module provides the error types and user-friendly error reporting for
//! the hydration engine and its command-line surface. The error system follows
//! two principles:
//! 1. **Strongly-typed errors** so callers can branch on the failure mode
//!    (an authentication failure is handled differently from a network blip)
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # What is *not* an error
//!
//! The engine degrades gracefully wherever a failure would only cost
//! readability:
//! - A corrupt cache entry is a cache miss (logged)
//! - A failed cache write is swallowed (logged)
//! - An unresolved foreign key keeps its raw value
//! - A dataset without relationships passes through hydration unchanged
//!
//! Fetch failures, on the other hand, are always surfaced: a view must never
//! be hydrated from a partial set of datasets.
//!
//! # Examples
//!
//! ```rust,no_run
//! use hydrant_cli::core::{HydrantError, ErrorContext};
//!
//! let error = HydrantError::AuthenticationFailed {
//!     dataset: "PROJECTS".to_string(),
//!     message: "token expired".to_string(),
//! };
//! let context = ErrorContext::new(error)
//!     .with_suggestion("Run 'hydrant login --token <TOKEN>' with a fresh token");
//!
//! context.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for Hydrant operations.
///
/// Fetch failures are split into authentication, permission and generic
/// failures so that callers can decide whether a retry, a sign-in prompt or
/// an access request is the right reaction.
#[derive(Error, Debug)]
pub enum HydrantError {
    /// The remote table rejected the credential (HTTP 401).
    #[error("Authentication failed while fetching dataset {dataset}: {message}")]
    AuthenticationFailed {
        /// Dataset being fetched
        dataset: String,
        /// Message reported by the remote store
        message: String,
    },

    /// The credential is valid but lacks access to the table (HTTP 403).
    #[error("Permission denied for dataset {dataset}: {message}")]
    PermissionDenied {
        /// Dataset being fetched
        dataset: String,
        /// Message reported by the remote store
        message: String,
    },

    /// Any other fetch failure.
    ///
    /// `transient` marks failures worth retrying (timeouts, connection
    /// errors, 5xx and 429 responses).
    #[error("Failed to fetch dataset {dataset}: {message}")]
    FetchFailed {
        /// Dataset being fetched
        dataset: String,
        /// Description of the failure
        message: String,
        /// Whether a retry may succeed
        transient: bool,
    },

    /// A dataset name that does not correspond to any known dataset.
    #[error("Unknown dataset: {name}")]
    UnknownDataset {
        /// The name that failed to parse
        name: String,
    },

    /// Datasets reference each other in a cycle and strict ordering was requested.
    #[error("Hydration dependency cycle detected: {chain}")]
    HydrationCycle {
        /// Human-readable cycle, e.g. `PEOPLE -> BUSINESS_UNITS -> PEOPLE`
        chain: String,
    },

    /// A dataset was hydrated before a dataset it references.
    #[error("Dataset {dataset} references {dependency}, which has not been hydrated yet")]
    UnhydratedDependency {
        /// Dataset being hydrated
        dataset: String,
        /// Referenced dataset that is still raw
        dependency: String,
    },

    /// A write was attempted without a credential.
    #[error("Dataset {dataset} is a read-only preview; sign in to modify it")]
    ReadOnlyPreview {
        /// Dataset the write targeted
        dataset: String,
    },

    /// A row mutation addressed a row that the snapshot does not contain.
    #[error("Row {row_index} not found in dataset {dataset}")]
    RowNotFound {
        /// Dataset the write targeted
        dataset: String,
        /// Row index that was addressed
        row_index: usize,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// Cache storage error (only surfaced by explicit cache management commands)
    #[error("Cache error: {message}")]
    CacheError {
        /// Description of the cache failure
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Generic error for cases not covered by specific variants
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

impl HydrantError {
    /// Whether retrying the failed operation may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::FetchFailed {
                transient: true,
                ..
            }
        )
    }

    /// Whether the failure is caused by the credential rather than the data.
    ///
    /// Credential failures are never masked by stale cache data: serving the
    /// previous user's snapshot after a rejected sign-in would leak data.
    #[must_use]
    pub const fn is_credential_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. } | Self::PermissionDenied { .. })
    }
}

impl Clone for HydrantError {
    fn clone(&self) -> Self {
        match self {
            Self::AuthenticationFailed {
                dataset,
                message,
            } => Self::AuthenticationFailed {
                dataset: dataset.clone(),
                message: message.clone(),
            },
            Self::PermissionDenied {
                dataset,
                message,
            } => Self::PermissionDenied {
                dataset: dataset.clone(),
                message: message.clone(),
            },
            Self::FetchFailed {
                dataset,
                message,
                transient,
            } => Self::FetchFailed {
                dataset: dataset.clone(),
                message: message.clone(),
                transient: *transient,
            },
            Self::UnknownDataset {
                name,
            } => Self::UnknownDataset {
                name: name.clone(),
            },
            Self::HydrationCycle {
                chain,
            } => Self::HydrationCycle {
                chain: chain.clone(),
            },
            Self::UnhydratedDependency {
                dataset,
                dependency,
            } => Self::UnhydratedDependency {
                dataset: dataset.clone(),
                dependency: dependency.clone(),
            },
            Self::ReadOnlyPreview {
                dataset,
            } => Self::ReadOnlyPreview {
                dataset: dataset.clone(),
            },
            Self::RowNotFound {
                dataset,
                row_index,
            } => Self::RowNotFound {
                dataset: dataset.clone(),
                row_index: *row_index,
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            Self::CacheError {
                message,
            } => Self::CacheError {
                message: message.clone(),
            },
            // For errors that don't implement Clone, convert to Other
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::JsonError(e) => Self::Other {
                message: format!("JSON error: {e}"),
            },
            Self::TomlError(e) => Self::Other {
                message: format!("TOML parsing error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Error context wrapper that provides user-friendly error information.
///
/// When displayed, errors show:
/// 1. **Error**: The main error message in red
/// 2. **Details**: Additional context about the error in yellow (optional)
/// 3. **Suggestion**: Actionable steps to resolve the issue in green (optional)
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying Hydrant error
    pub error: HydrantError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: HydrantError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognizes [`HydrantError`] variants, IO errors and TOML errors; anything
/// else is reported with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(hydrant_error) = error.downcast_ref::<HydrantError>() {
        return create_error_context(hydrant_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        if io_error.kind() == std::io::ErrorKind::PermissionDenied {
            return ErrorContext::new(HydrantError::Other {
                message: io_error.to_string(),
            })
            .with_suggestion("Check the ownership and permissions of ~/.hydrant and its files");
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(HydrantError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of your config file, or recreate it with 'hydrant config init --force'");
    }

    // Generic error - include the full error chain for better diagnostics
    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(HydrantError::Other {
        message,
    })
}

fn create_error_context(error: HydrantError) -> ErrorContext {
    match &error {
        HydrantError::AuthenticationFailed {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Run 'hydrant login --token <TOKEN>' with a valid token, or 'hydrant logout' to browse the demo data")
            .with_details("The table API rejected the stored credential; cached datasets were not used"),
        HydrantError::PermissionDenied {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Ask the table owner to share it with your account")
            .with_details("The credential is valid but cannot read this table"),
        HydrantError::FetchFailed {
            transient: true,
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check your network connection and try again")
            .with_details("The request was retried with exponential backoff before giving up"),
        HydrantError::UnknownDataset {
            ..
        } => ErrorContext::new(error).with_suggestion(
            "Valid datasets: PROJECTS, TASKS, PEOPLE, BUSINESS_UNITS, FLYWHEELS, CAMPAIGNS, CLIENTS",
        ),
        HydrantError::HydrationCycle {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Drop --strict to hydrate cyclic datasets against their raw rows")
            .with_details("Hydration is one hop per pass; cyclic references cannot all see hydrated rows"),
        HydrantError::UnhydratedDependency {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Hydrate the referenced dataset first, or use 'hydrant hydrate --all'"),
        HydrantError::ReadOnlyPreview {
            ..
        } => ErrorContext::new(error).with_suggestion("Run 'hydrant login --token <TOKEN>'"),
        HydrantError::ConfigError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Run 'hydrant config show' to inspect the active configuration"),
        _ => ErrorContext::new(error),
    }
}
