//! Utility modules shared by the library and the CLI.
//!
//! - [`fs`]: atomic file writes and `~`/`$VAR` path expansion
//! - [`progress`]: progress indicators for multi-dataset fetches

pub mod fs;
pub mod progress;

pub use fs::{atomic_write, expand_path};
pub use progress::ProgressBar;
