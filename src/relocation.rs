//! Relocation detection for source files missing from the target
//!
//! A source file with no counterpart at its own relative path may still exist
//! in the target under a different directory, for example after the whole
//! folder was moved there. Such a file is *relocated* and must not be copied
//! again. A fingerprint match that does not pass the sibling check is only
//! *additional*: the file is copied and the matching target paths are
//! reported next to it.

use crate::fingerprint::{fingerprint, is_ignored, lower_extension};
use crate::index::TargetIndex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Outcome of resolving one unmatched source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// An equivalent file with consistent siblings exists at `target`; do not copy
    Relocated { target: PathBuf },
    /// Fingerprint matches exist but relocation criteria failed; copy anyway
    Additional { candidates: Vec<PathBuf> },
    /// Nothing in the target resembles this file
    Unrelated,
}

/// Matches unmatched source files against the target fingerprint index
#[derive(Debug, Clone, Copy)]
pub struct RelocationResolver<'a> {
    source_root: &'a Path,
    index: &'a TargetIndex,
}

impl<'a> RelocationResolver<'a> {
    #[must_use]
    pub const fn new(source_root: &'a Path, index: &'a TargetIndex) -> Self {
        Self { source_root, index }
    }

    /// Classify `file`, a source file whose relative path is absent from the target
    ///
    /// Only candidates sharing both fingerprint and extension are considered.
    /// A candidate whose own relative path also exists in the source is a
    /// shared asset and makes the file additional. Otherwise the candidate is
    /// a relocation when every sibling of `file` is present next to it. The
    /// first relocating candidate wins over any additional match.
    #[must_use]
    pub fn resolve(&self, file: &Path) -> Resolution {
        let Some(print) = fingerprint(file) else {
            return Resolution::Unrelated;
        };

        let candidates = self.index.candidates(print);
        if candidates.is_empty() {
            return Resolution::Unrelated;
        }

        let extension = lower_extension(file);
        let mut additional = false;

        for candidate in candidates
            .iter()
            .filter(|c| lower_extension(c) == extension)
        {
            if self.exists_in_source(candidate) {
                debug!(
                    "{} matches shared file {}",
                    file.display(),
                    candidate.display()
                );
                additional = true;
            } else if siblings_present(file, candidate) {
                debug!(
                    "{} was relocated to {}",
                    file.display(),
                    candidate.display()
                );
                return Resolution::Relocated {
                    target: candidate.clone(),
                };
            } else {
                debug!(
                    "{} matches {} but its siblings are missing there",
                    file.display(),
                    candidate.display()
                );
                additional = true;
            }
        }

        if additional {
            Resolution::Additional {
                candidates: candidates.to_vec(),
            }
        } else {
            Resolution::Unrelated
        }
    }

    /// Whether the candidate's target-relative path is also present in the source
    fn exists_in_source(&self, candidate: &Path) -> bool {
        candidate
            .strip_prefix(self.index.root())
            .is_ok_and(|relative| self.source_root.join(relative).exists())
    }
}

/// Whether every sibling file of `file` has a same-named counterpart beside `candidate`
fn siblings_present(file: &Path, candidate: &Path) -> bool {
    let (Some(source_dir), Some(target_dir)) = (file.parent(), candidate.parent()) else {
        return false;
    };

    let entries = match fs::read_dir(source_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to list siblings in {}: {}", source_dir.display(), e);
            return false;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to read entry in {}: {}", source_dir.display(), e);
                return false;
            }
        };
        let sibling = entry.path();
        let is_file = entry.file_type().is_ok_and(|t| t.is_file());
        if !is_file || sibling == file || is_ignored(&sibling) {
            continue;
        }
        if !target_dir.join(entry.file_name()).exists() {
            debug!(
                "Sibling {} missing under {}",
                sibling.display(),
                target_dir.display()
            );
            return false;
        }
    }

    true
}
