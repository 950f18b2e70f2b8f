//! Target tree indexing
//!
//! The target root is walked exactly once before the source pass begins. The
//! resulting [`TargetIndex`] is a frozen snapshot: nothing in this crate
//! mutates it after [`build_target_index`] returns.

use crate::error::Result;
use crate::fingerprint::{fingerprint, is_ignored, Fingerprint};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Lower-cased relative path -> absolute target path
///
/// On a case-insensitive key collision the last file walked wins.
pub type PathIndex = HashMap<String, PathBuf>;

/// Fingerprint -> every target path carrying it, in walk order
pub type HashIndex = HashMap<Fingerprint, Vec<PathBuf>>;

/// Snapshot of the target tree taken before a sync
#[derive(Debug, Default, Clone)]
pub struct TargetIndex {
    root: PathBuf,
    paths: PathIndex,
    hashes: HashIndex,
    /// Lower-cased relative path -> on-disk spelling of each target directory
    directories: HashMap<String, PathBuf>,
    file_count: u64,
}

impl TargetIndex {
    /// Root the snapshot was taken from
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn paths(&self) -> &PathIndex {
        &self.paths
    }

    #[must_use]
    pub const fn hashes(&self) -> &HashIndex {
        &self.hashes
    }

    /// Number of non-ignored files seen in the target tree
    #[must_use]
    pub const fn file_count(&self) -> u64 {
        self.file_count
    }

    /// Look up a target file by its path relative to the target root
    #[must_use]
    pub fn lookup(&self, relative: &Path) -> Option<&PathBuf> {
        self.paths.get(&index_key(relative))
    }

    /// Target location mirroring a source-relative path
    ///
    /// Every leading component that matches an existing target directory
    /// case-insensitively takes that directory's on-disk spelling, so a source
    /// folder `Photos` lands in an existing target folder `photos`. The
    /// remaining components keep the source spelling.
    #[must_use]
    pub fn destination(&self, relative: &Path) -> PathBuf {
        let mut resolved = self.root.clone();
        let mut prefix = PathBuf::new();
        let mut matching = true;

        for component in relative.components() {
            prefix.push(component);
            match self.directories.get(&index_key(&prefix)) {
                Some(existing) if matching => resolved.clone_from(existing),
                _ => {
                    matching = false;
                    resolved.push(component);
                }
            }
        }

        resolved
    }

    /// Target paths sharing this fingerprint
    #[must_use]
    pub fn candidates(&self, print: Fingerprint) -> &[PathBuf] {
        self.hashes
            .get(&print)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Record one target file, fingerprinting it on the way
    ///
    /// A file that cannot be read is still counted and path-indexed.
    fn index_file(&mut self, relative: &Path, absolute: PathBuf) {
        let print = fingerprint(&absolute);
        self.file_count += 1;
        if let Some(print) = print {
            self.hashes.entry(print).or_default().push(absolute.clone());
        }
        self.paths.insert(index_key(relative), absolute);
    }
}

/// Key used in the [`PathIndex`]: lower-cased, `/`-separated relative path
#[must_use]
pub fn index_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
        .collect::<Vec<_>>()
        .join("/")
}

/// Walk the target tree and index every non-ignored file
///
/// Each file is recorded by lower-cased relative path and, when it can be
/// read, by fingerprint. Unreadable files stay in the path index but are left
/// out of the hash index. Directories only have their on-disk spelling
/// remembered for [`TargetIndex::destination`].
///
/// # Errors
///
/// Returns an error if a directory in the target tree cannot be listed.
pub fn build_target_index(root: &Path) -> Result<TargetIndex> {
    info!("Indexing target tree {}", root.display());

    let mut index = TargetIndex {
        root: root.to_path_buf(),
        ..TargetIndex::default()
    };

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        let absolute = entry.path().to_path_buf();
        let Ok(relative) = absolute.strip_prefix(root) else {
            continue;
        };
        let relative = relative.to_path_buf();

        if entry.file_type().is_dir() {
            if entry.depth() > 0 {
                index.directories.insert(index_key(&relative), absolute);
            }
        } else if entry.file_type().is_file() && !is_ignored(&absolute) {
            debug!("Indexed {}", relative.display());
            index.index_file(&relative, absolute);
        }
    }

    info!(
        "Indexed {} target files ({} distinct fingerprints)",
        index.file_count,
        index.hashes.len()
    );

    Ok(index)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_index_key_is_lowercase_and_slash_separated() {
        let key = index_key(&Path::new("Docs").join("Sub").join("ReadMe.TXT"));
        assert_eq!(key, "docs/sub/readme.txt");
    }

    #[test]
    fn test_build_indexes_files_not_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::create_dir(root.join("empty")).unwrap();
        fs::write(root.join("top.txt"), b"top").unwrap();
        fs::write(root.join("a/b/Deep.TXT"), b"deep").unwrap();

        let index = build_target_index(root).unwrap();

        assert_eq!(index.file_count(), 2);
        assert_eq!(index.paths().len(), 2);
        assert_eq!(
            index.lookup(Path::new("A/B/deep.txt")),
            Some(&root.join("a/b/Deep.TXT"))
        );
        assert!(index.lookup(Path::new("empty")).is_none());
    }

    #[test]
    fn test_ignored_files_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("Thumbs.db"), b"cache").unwrap();
        fs::write(root.join("desktop.ini"), b"[shell]").unwrap();
        fs::write(root.join("kept.txt"), b"kept").unwrap();

        let index = build_target_index(root).unwrap();

        assert_eq!(index.file_count(), 1);
        assert!(index.lookup(Path::new("thumbs.db")).is_none());
        assert_eq!(index.hashes().values().map(Vec::len).sum::<usize>(), 1);
    }

    #[test]
    fn test_vanished_file_is_path_indexed_without_fingerprint() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let mut index = TargetIndex {
            root: root.to_path_buf(),
            ..TargetIndex::default()
        };

        index.index_file(Path::new("gone.txt"), root.join("gone.txt"));

        assert_eq!(index.file_count(), 1);
        assert_eq!(index.lookup(Path::new("gone.txt")), Some(&root.join("gone.txt")));
        assert!(index.hashes().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_is_left_out_of_hash_index() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let locked = root.join("locked.txt");
        fs::write(&locked, b"secret").unwrap();
        fs::write(root.join("open.txt"), b"public").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        if fs::read(&locked).is_ok() {
            // Privileged users bypass file modes
            return;
        }

        let index = build_target_index(root).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

        assert_eq!(index.file_count(), 2);
        assert!(index.lookup(Path::new("locked.txt")).is_some());
        assert_eq!(index.hashes().values().map(Vec::len).sum::<usize>(), 1);
        assert!(!index.hashes().values().flatten().any(|p| p == &locked));
    }

    #[test]
    fn test_destination_follows_existing_directory_case() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("photos/2024")).unwrap();

        let index = build_target_index(root).unwrap();

        assert_eq!(
            index.destination(Path::new("Photos/2024/B.jpg")),
            root.join("photos/2024/B.jpg")
        );
        assert_eq!(
            index.destination(Path::new("Photos/Trip/x.txt")),
            root.join("photos/Trip/x.txt")
        );
        assert_eq!(index.destination(Path::new("Other")), root.join("Other"));
    }

    #[test]
    fn test_duplicate_content_shares_a_bucket() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("x")).unwrap();
        fs::write(root.join("license.txt"), b"MIT").unwrap();
        fs::write(root.join("x/license.txt"), b"MIT").unwrap();

        let index = build_target_index(root).unwrap();
        let print = fingerprint(&root.join("license.txt")).unwrap();

        assert_eq!(
            index.candidates(print),
            &[root.join("license.txt"), root.join("x/license.txt")]
        );
    }
}
