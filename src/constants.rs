//! Global constants used throughout the Hydrant codebase.
//!
//! This module contains cache naming conventions, timeout durations, retry
//! parameters, and other values that are shared across modules.

use std::time::Duration;

/// Prefix of every dataset cache key (`dataset_<DatasetKey>`).
///
/// Credential changes purge the whole namespace with a single
/// `invalidate_prefix` call, so every dataset cache entry must use it.
pub const DATASET_CACHE_PREFIX: &str = "dataset_";

/// Cache key recording which credential the cached datasets belong to.
///
/// Outside [`DATASET_CACHE_PREFIX`], so dataset purges leave it in place.
pub const CREDENTIAL_FINGERPRINT_KEY: &str = "credential_fingerprint";

/// Lifetime of the credential fingerprint entry (ten years).
pub const CREDENTIAL_FINGERPRINT_TTL_MINUTES: u64 = 10 * 365 * 24 * 60;

/// Default time-to-live for cached dataset snapshots, in minutes.
pub const DEFAULT_CACHE_TTL_MINUTES: u64 = 5;

/// Milliseconds per minute, used to turn TTL minutes into an absolute expiry.
pub const MILLIS_PER_MINUTE: i64 = 60_000;

/// Suffix appended to a source field to name its resolved display value.
pub const RESOLVED_SUFFIX: &str = "_resolved";

/// Separator used when joining the display values of a multi-valued reference.
pub const DISPLAY_SEPARATOR: &str = ", ";

/// Delimiter of multi-valued foreign keys stored in a single cell.
pub const FOREIGN_KEY_DELIMITER: char = ',';

/// Field name under which the synthetic row index is serialized.
pub const ROW_INDEX_FIELD: &str = "rowIndex";

/// Default timeout for a single HTTP request to the table API (30 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Starting delay for exponential backoff of transient fetch failures (100ms).
pub const STARTING_BACKOFF_DELAY_MS: u64 = 100;

/// Maximum backoff delay between fetch retries (2 seconds).
pub const MAX_BACKOFF_DELAY_MS: u64 = 2_000;

/// Number of retries after the first failed attempt of a transient fetch.
pub const MAX_FETCH_RETRIES: usize = 3;

/// Environment variable that disables progress indicators.
pub const NO_PROGRESS_ENV: &str = "HYDRANT_NO_PROGRESS";

/// Environment variable that overrides the configuration file location.
pub const CONFIG_PATH_ENV: &str = "HYDRANT_CONFIG_PATH";
