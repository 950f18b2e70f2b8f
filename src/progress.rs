//! Progress tracking and reporting

use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Spinner shown while the source tree is walked
pub struct ProgressTracker {
    progress_bar: ProgressBar,
}

impl ProgressTracker {
    /// Visible spinner on stderr
    #[must_use]
    pub fn new() -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {pos} files {wide_msg}")
        {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(120));

        Self { progress_bar: pb }
    }

    /// Tracker that draws nothing
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            progress_bar: ProgressBar::hidden(),
        }
    }

    pub fn update(&self, file: &Path) {
        self.progress_bar.inc(1);
        self.progress_bar.set_message(file.display().to_string());
    }

    pub fn finish(&self, summary: &str) {
        self.progress_bar.finish_with_message(summary.to_string());
    }
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("position", &self.progress_bar.position())
            .field("hidden", &self.progress_bar.is_hidden())
            .finish()
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::hidden()
    }
}
