//! Common test helpers for integration tests

#![allow(dead_code)]

use dirsync::{DirectorySyncer, SyncReport};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A source and a target directory living for the duration of one test
pub struct Trees {
    source: TempDir,
    target: TempDir,
}

impl Trees {
    pub fn new() -> Self {
        Self {
            source: TempDir::new().expect("Failed to create source dir"),
            target: TempDir::new().expect("Failed to create target dir"),
        }
    }

    pub fn source(&self) -> &Path {
        self.source.path()
    }

    pub fn target(&self) -> &Path {
        self.target.path()
    }

    pub fn src(&self, relative: &str) -> PathBuf {
        self.source.path().join(relative)
    }

    pub fn dst(&self, relative: &str) -> PathBuf {
        self.target.path().join(relative)
    }

    /// Write `contents` into the source tree, creating parents
    pub fn write_source(&self, relative: &str, contents: &[u8]) -> PathBuf {
        write_file(self.source(), relative, contents)
    }

    /// Write `contents` into the target tree, creating parents
    pub fn write_target(&self, relative: &str, contents: &[u8]) -> PathBuf {
        write_file(self.target(), relative, contents)
    }

    /// Index the target and sync the source into it
    pub fn sync(&self, simulate: bool) -> SyncReport {
        let mut syncer = DirectorySyncer::new(self.source(), self.target(), simulate);
        let index = syncer.build_target_index().expect("Failed to index target");
        syncer.sync(&index).expect("Sync failed")
    }

    /// Sync followed by empty-directory pruning
    pub fn sync_and_prune(&self, simulate: bool) -> SyncReport {
        let mut syncer = DirectorySyncer::new(self.source(), self.target(), simulate);
        let index = syncer.build_target_index().expect("Failed to index target");
        let report = syncer.sync(&index).expect("Sync failed");
        syncer
            .cleanup_empty_directories(report)
            .expect("Cleanup failed")
    }
}

pub fn write_file(root: &Path, relative: &str, contents: &[u8]) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    fs::write(&path, contents).expect("Failed to write file");
    path
}

/// `len` bytes of a repeating pattern seeded by `seed`
pub fn content(seed: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| seed.wrapping_add((i % 97) as u8))
        .collect()
}

pub fn size(path: &Path) -> u64 {
    fs::metadata(path).expect("Failed to stat file").len()
}

/// Every file below `root`, relative and sorted
pub fn list_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect();
    files.sort();
    files
}
