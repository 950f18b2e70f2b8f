//! Synchronization report
//!
//! [`SyncReport`] is the single owner of everything a run decided. The source
//! walk hands it one [`SyncEvent`] at a time through [`SyncReport::record`];
//! callers only ever read from it once the run is finished.

use crate::sync::SyncEvent;
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Counters and categorized path mappings describing one sync run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    source_files: u64,
    source_directories: u64,
    target_files: u64,
    changed_files: u64,
    new_files: u64,
    new_directory_count: u64,
    relocated_files: u64,

    changed: BTreeMap<PathBuf, PathBuf>,
    new: BTreeMap<PathBuf, PathBuf>,
    new_directories: Vec<PathBuf>,
    relocated: BTreeMap<PathBuf, PathBuf>,
    additional: BTreeMap<PathBuf, Vec<PathBuf>>,

    duration: Duration,
}

impl SyncReport {
    /// Start a report for a target holding `target_files` indexed files
    #[must_use]
    pub fn new(target_files: u64) -> Self {
        Self {
            target_files,
            ..Self::default()
        }
    }

    /// Apply one decision from the source walk
    pub fn record(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::SourceDirectory => self.source_directories += 1,
            SyncEvent::NewDirectory(path) => {
                self.new_directory_count += 1;
                self.new_directories.push(path);
            }
            SyncEvent::Unchanged | SyncEvent::AlreadySynced => self.source_files += 1,
            SyncEvent::Changed { source, target } => {
                self.source_files += 1;
                self.changed_files += 1;
                self.changed.insert(source, target);
            }
            SyncEvent::New { source, target } => {
                self.source_files += 1;
                self.new_files += 1;
                self.new.insert(source, target);
            }
            SyncEvent::Relocated { source, target } => {
                self.source_files += 1;
                self.relocated_files += 1;
                self.relocated.insert(source, target);
                self.drop_relocated_from_additional();
            }
            SyncEvent::Additional {
                source,
                target,
                candidates,
            } => {
                self.source_files += 1;
                self.new_files += 1;
                self.new.insert(source.clone(), target);
                self.additional.insert(source, candidates);
                self.drop_relocated_from_additional();
            }
        }
    }

    /// A file is either relocated or additional, never both
    fn drop_relocated_from_additional(&mut self) {
        let relocated = &self.relocated;
        self.additional
            .retain(|source, _| !relocated.contains_key(source));
    }

    /// Forget a directory pruned after the walk
    ///
    /// Returns `false` when the directory was not recorded as new.
    pub fn remove_new_directory(&mut self, dir: &Path) -> bool {
        let Some(position) = self.new_directories.iter().position(|d| d == dir) else {
            return false;
        };
        self.new_directories.remove(position);
        self.new_directory_count -= 1;
        true
    }

    /// Stamp the elapsed time of the run
    pub fn finish(&mut self, duration: Duration) {
        self.duration = duration;
    }

    #[must_use]
    pub const fn source_files(&self) -> u64 {
        self.source_files
    }

    #[must_use]
    pub const fn source_directories(&self) -> u64 {
        self.source_directories
    }

    #[must_use]
    pub const fn target_files(&self) -> u64 {
        self.target_files
    }

    #[must_use]
    pub const fn changed_files(&self) -> u64 {
        self.changed_files
    }

    #[must_use]
    pub const fn new_files(&self) -> u64 {
        self.new_files
    }

    #[must_use]
    pub const fn new_directory_count(&self) -> u64 {
        self.new_directory_count
    }

    #[must_use]
    pub const fn relocated_files(&self) -> u64 {
        self.relocated_files
    }

    /// Source path -> collision-named copy in the target
    #[must_use]
    pub const fn changed(&self) -> &BTreeMap<PathBuf, PathBuf> {
        &self.changed
    }

    /// Source path -> mirrored copy in the target
    #[must_use]
    pub const fn new_entries(&self) -> &BTreeMap<PathBuf, PathBuf> {
        &self.new
    }

    /// Directories created (or, when simulating, that would be created), in walk order
    #[must_use]
    pub fn new_directories(&self) -> &[PathBuf] {
        &self.new_directories
    }

    /// Source path -> target file it was matched to
    #[must_use]
    pub const fn relocated(&self) -> &BTreeMap<PathBuf, PathBuf> {
        &self.relocated
    }

    /// Source path -> every target path sharing its fingerprint
    #[must_use]
    pub const fn additional(&self) -> &BTreeMap<PathBuf, Vec<PathBuf>> {
        &self.additional
    }

    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// Render the summary followed by one table per non-empty category
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!("{self}\n");

        render_pairs(&mut out, "Changed files", &self.changed);
        render_pairs(&mut out, "New files", &self.new);
        render_pairs(&mut out, "Relocated files", &self.relocated);

        if !self.additional.is_empty() {
            let joined: BTreeMap<PathBuf, String> = self
                .additional
                .iter()
                .map(|(source, targets)| {
                    let targets = targets
                        .iter()
                        .map(|t| t.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    (source.clone(), targets)
                })
                .collect();
            render_table(
                &mut out,
                "Additional files",
                joined.iter().map(|(s, t)| (s.display().to_string(), t.clone())),
            );
        }

        if !self.new_directories.is_empty() {
            let _ = writeln!(out, "\nNew directories");
            for dir in &self.new_directories {
                let _ = writeln!(out, "  {}", dir.display());
            }
        }

        out
    }
}

fn render_pairs(out: &mut String, title: &str, pairs: &BTreeMap<PathBuf, PathBuf>) {
    if pairs.is_empty() {
        return;
    }
    render_table(
        out,
        title,
        pairs
            .iter()
            .map(|(s, t)| (s.display().to_string(), t.display().to_string())),
    );
}

fn render_table(out: &mut String, title: &str, rows: impl Iterator<Item = (String, String)>) {
    const SOURCE_HEADER: &str = "Location in source folder";
    const TARGET_HEADER: &str = "Location in target folder";

    let rows: Vec<(String, String)> = rows.collect();
    let width = rows
        .iter()
        .map(|(s, _)| s.chars().count())
        .max()
        .unwrap_or(0)
        .max(SOURCE_HEADER.len());

    let _ = writeln!(out, "\n{title}");
    let _ = writeln!(out, "  {SOURCE_HEADER:<width$}  {TARGET_HEADER}");
    for (source, target) in rows {
        let _ = writeln!(out, "  {source:<width$}  {target}");
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Synced {} source files in {} directories against {} target files in {:.3}s: \
             {} changed, {} new, {} relocated, {} new directories",
            self.source_files,
            self.source_directories,
            self.target_files,
            self.duration.as_secs_f64(),
            self.changed_files,
            self.new_files,
            self.relocated_files,
            self.new_directory_count
        )
    }
}
