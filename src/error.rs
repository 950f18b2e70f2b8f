//! Error handling and types

use thiserror::Error;

/// Synchronization and file operation errors
#[derive(Error, Debug)]
pub enum SyncError {
    /// File copy operation failed
    #[error("Copy operation failed: {0}")]
    CopyFailed(String),

    /// Directory traversal failed
    #[error("Directory traversal failed: {0}")]
    DirectoryTraversal(String),

    /// General filesystem error
    #[error("File system error: {0}")]
    FileSystem(String),
}

impl From<walkdir::Error> for SyncError {
    fn from(e: walkdir::Error) -> Self {
        Self::DirectoryTraversal(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
