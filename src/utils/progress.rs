//! Progress indicators for multi-dataset fetches.
//!
//! Progress goes to stderr and is hidden entirely when the
//! `HYDRANT_NO_PROGRESS` environment variable is set, when the CLI runs with
//! `--no-progress` or `--quiet`, or when stderr is not a terminal (indicatif
//! handles that last case itself).
//!
//! ```rust
//! use hydrant_cli::utils::progress::ProgressBar;
//!
//! let progress = ProgressBar::new(3, true);
//! progress.set_message("PROJECTS");
//! progress.inc(1);
//! progress.finish_and_clear();
//! ```

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle};
use std::time::Duration;

use crate::constants::NO_PROGRESS_ENV;

/// Whether the environment disables progress indicators.
#[must_use]
pub fn is_progress_disabled() -> bool {
    std::env::var_os(NO_PROGRESS_ENV).is_some()
}

/// A progress bar that becomes a no-op when progress is disabled.
#[derive(Debug, Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// A bar over `len` steps; hidden unless `enabled` and not disabled by the environment.
    #[must_use]
    pub fn new(len: u64, enabled: bool) -> Self {
        let inner = if enabled && !is_progress_disabled() {
            let bar = IndicatifBar::new(len);
            bar.set_style(bar_style());
            bar
        } else {
            IndicatifBar::hidden()
        };
        Self {
            inner,
        }
    }

    /// A spinner for work of unknown length.
    #[must_use]
    pub fn new_spinner(enabled: bool) -> Self {
        let inner = if enabled && !is_progress_disabled() {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        } else {
            IndicatifBar::hidden()
        };
        Self {
            inner,
        }
    }

    /// Whether nothing is drawn.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.inner.is_hidden()
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }

    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.inner.finish_with_message(msg.into());
    }

    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .map(|style| style.progress_chars("━╸━"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .map(|style| style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]))
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
