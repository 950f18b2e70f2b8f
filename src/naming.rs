//! Collision-safe destination names
//!
//! When a different file already sits at the destination, the copy is placed
//! next to it under a numbered name: `report.tar.gz` becomes
//! `report.tar (1).gz`, then `report.tar (2).gz`, and so on.

use std::path::Path;

/// Build the `counter`-th collision name for `path`
///
/// The file name is split on `.` and `" (<counter>)"` is inserted right before
/// the final extension. A name without any `.` gets the suffix appended.
/// Pure string manipulation, no filesystem access.
#[must_use]
pub fn rename_candidate(path: &Path, counter: u32) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let segments: Vec<&str> = name.split('.').collect();
    if segments.len() < 2 {
        return format!("{name} ({counter})");
    }

    let (head, extension) = segments.split_at(segments.len() - 1);
    format!("{} ({counter}).{}", head.join("."), extension.join("."))
}
