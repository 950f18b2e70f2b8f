//! Main synchronization logic
//!
//! This module reconciles a source tree into a target tree without ever
//! overwriting or deleting pre-existing target content.
//!
//! # Architecture
//!
//! A run has two phases that the caller drives explicitly:
//! 1. **Indexing**: [`DirectorySyncer::build_target_index`] walks the target
//!    once and returns a frozen [`TargetIndex`]
//! 2. **Reconciliation**: [`DirectorySyncer::sync`] walks the source, turns
//!    every entry into a [`SyncEvent`] and feeds it to the [`SyncReport`]
//!
//! An optional third step, [`DirectorySyncer::cleanup_empty_directories`],
//! removes mirrored directories that stayed empty because everything they
//! would have held was found relocated elsewhere in the target.
//!
//! # Usage
//!
//! ```rust,no_run
//! use dirsync::DirectorySyncer;
//!
//! fn main() -> dirsync::Result<()> {
//!     let mut syncer = DirectorySyncer::new("/data/photos", "/backup/photos", false);
//!     let index = syncer.build_target_index()?;
//!     let report = syncer.sync(&index)?;
//!     println!("{report}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! Fingerprinting never fails a run; an unreadable file just has no
//! fingerprint. Any failure to create a directory, copy a file or remove a
//! directory aborts the run. Files copied before the failure stay in place.
//!
//! # Simulation
//!
//! With `simulate` set, every decision is made and reported exactly as in a
//! real run, but no directory is created, no file is copied and no directory
//! is removed.

use crate::error::{Result, SyncError};
use crate::fingerprint::is_ignored;
use crate::index::{build_target_index, TargetIndex};
use crate::naming::rename_candidate;
use crate::progress::ProgressTracker;
use crate::relocation::{RelocationResolver, Resolution};
use crate::report::SyncReport;
use std::cmp::Reverse;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Outcome of visiting one source entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A source directory was visited
    SourceDirectory,
    /// A mirrored target directory was created (or would be, when simulating)
    NewDirectory(PathBuf),
    /// Same relative path and same size in both trees
    Unchanged,
    /// A collision-named copy with the source's size already exists
    AlreadySynced,
    /// Copied next to a differing target file under a collision name
    Changed { source: PathBuf, target: PathBuf },
    /// Copied to its mirrored path
    New { source: PathBuf, target: PathBuf },
    /// Found at another target location with its siblings; not copied
    Relocated { source: PathBuf, target: PathBuf },
    /// Copied to its mirrored path although fingerprint matches exist
    Additional {
        source: PathBuf,
        target: PathBuf,
        candidates: Vec<PathBuf>,
    },
}

/// One-way reconciler from a source root into a target root
#[derive(Debug)]
pub struct DirectorySyncer {
    source: PathBuf,
    target: PathBuf,
    simulate: bool,
    started: Instant,
    progress: ProgressTracker,
}

impl DirectorySyncer {
    /// Create a syncer for two existing directories
    ///
    /// # Panics
    ///
    /// Panics if `source` or `target` is not an existing directory. Symlinks
    /// are not followed for this check.
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>, simulate: bool) -> Self {
        let source = source.into();
        let target = target.into();
        assert!(
            is_real_directory(&source),
            "source root {} must be an existing directory",
            source.display()
        );
        assert!(
            is_real_directory(&target),
            "target root {} must be an existing directory",
            target.display()
        );

        Self {
            source,
            target,
            simulate,
            started: Instant::now(),
            progress: ProgressTracker::hidden(),
        }
    }

    /// Report progress of the source walk through `progress`
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    #[must_use]
    pub const fn is_simulation(&self) -> bool {
        self.simulate
    }

    /// Snapshot the target tree
    ///
    /// The run's elapsed time is measured from here.
    ///
    /// # Errors
    ///
    /// Returns an error if the target tree cannot be traversed.
    pub fn build_target_index(&mut self) -> Result<TargetIndex> {
        self.started = Instant::now();
        build_target_index(&self.target)
    }

    /// Walk the source tree against a target snapshot and bring the target up to date
    ///
    /// Directories are handled before their contents so mirrored directories
    /// exist before files are copied into them.
    ///
    /// # Errors
    ///
    /// Returns an error if the source tree cannot be traversed or if creating
    /// a directory or copying a file fails. The run stops at the first such
    /// failure.
    pub fn sync(&mut self, index: &TargetIndex) -> Result<SyncReport> {
        info!(
            "Starting synchronization from {} to {}{}",
            self.source.display(),
            self.target.display(),
            if self.simulate { " (simulation)" } else { "" }
        );

        let mut report = SyncReport::new(index.file_count());
        let resolver = RelocationResolver::new(&self.source, index);

        for entry in WalkDir::new(&self.source)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry?;
            let path = entry.path();
            let relative = path.strip_prefix(&self.source).map_err(|_| {
                SyncError::DirectoryTraversal(format!(
                    "{} is outside of {}",
                    path.display(),
                    self.source.display()
                ))
            })?;

            if entry.file_type().is_dir() {
                report.record(SyncEvent::SourceDirectory);
                if let Some(dir) = self.mirror_directory(relative, index)? {
                    report.record(SyncEvent::NewDirectory(dir));
                }
            } else if entry.file_type().is_file() && !is_ignored(path) {
                self.progress.update(relative);
                let event = self.visit_file(path, relative, index, &resolver)?;
                report.record(event);
            }
        }

        report.finish(self.started.elapsed());
        self.progress.finish(&report.to_string());
        info!("{}", report);

        Ok(report)
    }

    /// Create the target counterpart of a source directory if it is missing
    ///
    /// An existing target directory differing only in case is reused.
    fn mirror_directory(&self, relative: &Path, index: &TargetIndex) -> Result<Option<PathBuf>> {
        let dir = index.destination(relative);
        if dir.exists() {
            return Ok(None);
        }

        if !self.simulate {
            fs::create_dir_all(&dir).map_err(|e| {
                SyncError::FileSystem(format!(
                    "Failed to create directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        debug!("New directory {}", dir.display());

        Ok(Some(dir))
    }

    fn visit_file(
        &self,
        file: &Path,
        relative: &Path,
        index: &TargetIndex,
        resolver: &RelocationResolver<'_>,
    ) -> Result<SyncEvent> {
        let size = file_size(file)?;

        if let Some(existing) = index.lookup(relative) {
            if file_size(existing)? == size {
                debug!("Unchanged {}", relative.display());
                return Ok(SyncEvent::Unchanged);
            }
            return self.handle_changed(file, size, existing);
        }

        match resolver.resolve(file) {
            Resolution::Relocated { target } => Ok(SyncEvent::Relocated {
                source: file.to_path_buf(),
                target,
            }),
            Resolution::Additional { candidates } => Ok(SyncEvent::Additional {
                source: file.to_path_buf(),
                target: self.handle_new(file, relative, index)?,
                candidates,
            }),
            Resolution::Unrelated => Ok(SyncEvent::New {
                source: file.to_path_buf(),
                target: self.handle_new(file, relative, index)?,
            }),
        }
    }

    /// Copy a differing file next to `existing` under the first free collision name
    ///
    /// A collision name already holding a file of the source's size means an
    /// earlier run copied it there, so nothing is copied or reported.
    fn handle_changed(&self, file: &Path, size: u64, existing: &Path) -> Result<SyncEvent> {
        let dir = existing.parent().unwrap_or(self.target.as_path());
        let mut counter = 1;

        let destination = loop {
            let candidate = dir.join(rename_candidate(existing, counter));
            match fs::metadata(&candidate) {
                Ok(meta) if meta.len() == size => {
                    debug!(
                        "{} already synced as {}",
                        file.display(),
                        candidate.display()
                    );
                    return Ok(SyncEvent::AlreadySynced);
                }
                Ok(_) => counter += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => break candidate,
                Err(e) => {
                    return Err(SyncError::FileSystem(format!(
                        "Failed to inspect {}: {}",
                        candidate.display(),
                        e
                    )))
                }
            }
        };

        self.copy(file, &destination)?;
        debug!("Changed {} -> {}", file.display(), destination.display());

        Ok(SyncEvent::Changed {
            source: file.to_path_buf(),
            target: destination,
        })
    }

    /// Copy a file to its mirrored path in the target
    fn handle_new(&self, file: &Path, relative: &Path, index: &TargetIndex) -> Result<PathBuf> {
        let destination = index.destination(relative);
        self.copy(file, &destination)?;
        debug!("New {} -> {}", file.display(), destination.display());
        Ok(destination)
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        if self.simulate {
            return Ok(());
        }
        fs::copy(from, to).map_err(|e| {
            SyncError::CopyFailed(format!(
                "{} -> {}: {}",
                from.display(),
                to.display(),
                e
            ))
        })?;
        Ok(())
    }

    /// Remove new directories left empty by relocations
    ///
    /// Directories are examined deepest first so a parent is judged only after
    /// its children had their chance to be removed. A directory goes when it
    /// holds nothing in the target while its source counterpart holds something
    /// other than ignored files. The counterpart is matched case-insensitively.
    /// When simulating, files and directories the run would have created count
    /// as content.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be listed or removed.
    pub fn cleanup_empty_directories(&self, mut report: SyncReport) -> Result<SyncReport> {
        let mut dirs = report.new_directories().to_vec();
        dirs.sort_by_key(|dir| Reverse(dir.as_os_str().len()));

        for dir in dirs {
            if !is_empty_after_run(&dir, &report)? {
                continue;
            }
            let Ok(relative) = dir.strip_prefix(&self.target) else {
                continue;
            };
            let Some(counterpart) = self.source_counterpart(relative)? else {
                continue;
            };
            if !has_syncable_entries(&counterpart)? {
                continue;
            }

            if !self.simulate {
                fs::remove_dir(&dir).map_err(|e| {
                    SyncError::FileSystem(format!(
                        "Failed to remove directory {}: {}",
                        dir.display(),
                        e
                    ))
                })?;
            }
            report.remove_new_directory(&dir);
            info!("Removed empty directory {}", dir.display());
        }

        Ok(report)
    }

    /// Source directory whose path matches `relative` case-insensitively
    fn source_counterpart(&self, relative: &Path) -> Result<Option<PathBuf>> {
        let mut current = self.source.clone();

        for component in relative.components() {
            let exact = current.join(component);
            if exact.is_dir() {
                current = exact;
                continue;
            }

            let wanted = component.as_os_str().to_string_lossy().to_lowercase();
            let entries = match fs::read_dir(&current) {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                Err(e) => {
                    return Err(SyncError::FileSystem(format!(
                        "Failed to read directory {}: {}",
                        current.display(),
                        e
                    )))
                }
            };
            let found = entries.filter_map(std::result::Result::ok).find(|entry| {
                entry.path().is_dir() && entry.file_name().to_string_lossy().to_lowercase() == wanted
            });
            match found {
                Some(entry) => current = entry.path(),
                None => return Ok(None),
            }
        }

        Ok(Some(current))
    }
}

fn is_real_directory(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.is_dir())
}

fn file_size(path: &Path) -> Result<u64> {
    fs::metadata(path).map(|meta| meta.len()).map_err(|e| {
        SyncError::FileSystem(format!(
            "Failed to get metadata for {}: {}",
            path.display(),
            e
        ))
    })
}

fn has_entries(dir: &Path) -> Result<bool> {
    match fs::read_dir(dir) {
        Ok(mut entries) => Ok(entries.next().is_some()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(SyncError::FileSystem(format!(
            "Failed to read directory {}: {}",
            dir.display(),
            e
        ))),
    }
}

/// Whether `dir` holds anything a sync would act on
///
/// Ignored files such as `Thumbs.db` do not count.
fn has_syncable_entries(dir: &Path) -> Result<bool> {
    let entries = fs::read_dir(dir).map_err(|e| {
        SyncError::FileSystem(format!(
            "Failed to read directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| {
            SyncError::FileSystem(format!(
                "Failed to read directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        let ignored = entry.file_type().is_ok_and(|kind| kind.is_file()) && is_ignored(&entry.path());
        if !ignored {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Whether `dir` holds nothing, on disk or planned by this run
fn is_empty_after_run(dir: &Path, report: &SyncReport) -> Result<bool> {
    if has_entries(dir)? {
        return Ok(false);
    }

    let planned_file = report
        .new_entries()
        .values()
        .chain(report.changed().values())
        .any(|target| target.starts_with(dir));
    let planned_dir = report
        .new_directories()
        .iter()
        .any(|other| other != dir && other.starts_with(dir));

    Ok(!planned_file && !planned_dir)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, contents: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn run(source: &Path, target: &Path, simulate: bool) -> SyncReport {
        let mut syncer = DirectorySyncer::new(source, target, simulate);
        let index = syncer.build_target_index().unwrap();
        syncer.sync(&index).unwrap()
    }

    #[test]
    #[should_panic(expected = "source root")]
    fn test_missing_source_root_panics() {
        let target = TempDir::new().unwrap();
        let _ = DirectorySyncer::new(target.path().join("nope"), target.path(), false);
    }

    #[test]
    fn test_source_root_is_counted_but_not_created() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();

        let report = run(source.path(), target.path(), false);

        assert_eq!(report.source_directories(), 1);
        assert_eq!(report.new_directory_count(), 0);
        assert_eq!(report.source_files(), 0);
    }

    #[test]
    fn test_changed_skips_taken_names() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write(source.path(), "doc.html", &[b'a'; 80]);
        write(target.path(), "doc.html", &[b'b'; 100]);
        write(target.path(), "doc (1).html", &[b'c'; 90]);

        let report = run(source.path(), target.path(), false);

        let copy = target.path().join("doc (2).html");
        assert_eq!(fs::metadata(&copy).unwrap().len(), 80);
        assert_eq!(report.changed().get(&source.path().join("doc.html")), Some(&copy));
        assert_eq!(report.changed_files(), 1);
    }

    #[test]
    fn test_changed_stops_at_same_size_variant() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write(source.path(), "doc.html", &[b'a'; 80]);
        write(target.path(), "doc.html", &[b'b'; 100]);
        write(target.path(), "doc (1).html", &[b'a'; 80]);

        let report = run(source.path(), target.path(), false);

        assert!(!target.path().join("doc (2).html").exists());
        assert_eq!(report.changed_files(), 0);
        assert_eq!(report.source_files(), 1);
    }

    #[test]
    fn test_ignored_source_files_are_skipped() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write(source.path(), "Thumbs.db", b"cache");

        let report = run(source.path(), target.path(), false);

        assert_eq!(report.source_files(), 0);
        assert!(!target.path().join("Thumbs.db").exists());
    }

    #[test]
    fn test_nested_new_directories_in_simulation() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write(source.path(), "a/b/c.txt", b"deep");

        let report = run(source.path(), target.path(), true);

        assert_eq!(
            report.new_directories(),
            &[target.path().join("a"), target.path().join("a/b")]
        );
        assert!(!target.path().join("a").exists());
        assert_eq!(report.new_files(), 1);
    }

    #[test]
    fn test_new_file_lands_in_existing_directory_of_other_case() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write(source.path(), "Photos/a.txt", b"alpha");
        write(source.path(), "Photos/b.txt", b"bravo");
        write(target.path(), "photos/a.txt", b"alpha");

        let report = run(source.path(), target.path(), false);

        assert!(report.new_directories().is_empty());
        assert_eq!(
            report.new_entries().get(&source.path().join("Photos/b.txt")),
            Some(&target.path().join("photos/b.txt"))
        );
        let names: Vec<_> = fs::read_dir(target.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, ["photos"]);
    }

    #[test]
    fn test_source_counterpart_ignores_case() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        fs::create_dir_all(source.path().join("Photos/Trip")).unwrap();

        let syncer = DirectorySyncer::new(source.path(), target.path(), false);

        let found = syncer.source_counterpart(Path::new("photos/Trip")).unwrap().unwrap();
        assert!(found.is_dir());
        assert!(found.ends_with("Trip"));
        assert_eq!(syncer.source_counterpart(Path::new("missing")).unwrap(), None);
    }

    #[test]
    fn test_ignored_files_do_not_make_a_directory_syncable() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "Thumbs.db", b"cache");
        assert!(!has_syncable_entries(dir.path()).unwrap());

        write(dir.path(), "photo.jpg", b"jpeg");
        assert!(has_syncable_entries(dir.path()).unwrap());
    }

    #[test]
    fn test_cleanup_keeps_planned_content_in_simulation() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write(source.path(), "a/b/c.txt", b"deep");

        let syncer = DirectorySyncer::new(source.path(), target.path(), true);
        let report = run(source.path(), target.path(), true);
        let report = syncer.cleanup_empty_directories(report).unwrap();

        assert_eq!(report.new_directory_count(), 2);
    }
}
