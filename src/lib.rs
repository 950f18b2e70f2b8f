//! dirsync: one-way directory reconciliation
//!
//! This library brings a target directory up to date with a source directory
//! by copying only what is missing or changed. Nothing in the target is ever
//! overwritten or deleted: differing files are copied under collision-safe
//! numbered names, and files that were merely moved around in the target are
//! recognized by content fingerprint and left alone.

pub mod cli;
pub mod error;
pub mod fingerprint;
pub mod index;
pub mod naming;
pub mod progress;
pub mod relocation;
pub mod report;
pub mod sync;

// Re-export commonly used types
pub use error::{Result, SyncError};
pub use fingerprint::{fingerprint, is_ignored, Fingerprint};
pub use index::{build_target_index, HashIndex, PathIndex, TargetIndex};
pub use naming::rename_candidate;
pub use progress::ProgressTracker;
pub use relocation::{RelocationResolver, Resolution};
pub use report::SyncReport;
pub use sync::{DirectorySyncer, SyncEvent};
