//! Content fingerprints for relocation matching
//!
//! Implements:
//! - Streaming checksum (Adler-32 style) over the full file content
//! - Size-only fingerprints for media formats that are rarely edited in place
//! - The ignore list of OS-generated files that never take part in a sync

use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use tracing::{trace, warn};

/// Checksum modulus (prime number for Adler-32)
const MODULUS: u32 = 65521;

/// Chunk size used when streaming a file through the checksum
const CHUNK_SIZE: usize = 8 * 1024;

/// File names skipped entirely during both tree walks (case-insensitive)
pub const IGNORED_FILES: [&str; 2] = ["thumbs.db", "desktop.ini"];

/// Extensions whose fingerprint is the byte length instead of a checksum
/// (case-insensitive)
pub const NO_HASH_EXTENSIONS: [&str; 19] = [
    "png", "jpg", "jpeg", "mpg", "asf", "avi", "m4v", "mov", "pdf", "mp3", "mp4", "mp4v", "wm",
    "wmv", "aif", "mpe", "mpeg", "mpv2", "gif",
];

/// Probable-equality key for file content
///
/// Either a content checksum or, for [`NO_HASH_EXTENSIONS`], the file length.
/// Two files with equal fingerprints are only *probably* equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u64);

impl Fingerprint {
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Incremental Adler-32 style checksum
///
/// State is carried between [`Checksum::update`] calls so a file can be fed
/// through in chunks. Each file gets a fresh one.
#[derive(Debug, Default, Clone, Copy)]
pub struct Checksum {
    a: u32,
    b: u32,
}

impl Checksum {
    #[must_use]
    pub const fn new() -> Self {
        Self { a: 0, b: 0 }
    }

    /// Feed the next chunk of data
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.a = (self.a + u32::from(byte)) % MODULUS;
            self.b = (self.b + self.a) % MODULUS;
        }
    }

    /// Current checksum value
    #[must_use]
    pub const fn value(&self) -> u32 {
        (self.b << 16) | self.a
    }
}

/// Compute the checksum of a byte slice in one go
#[must_use]
pub fn checksum(data: &[u8]) -> u32 {
    let mut sum = Checksum::new();
    sum.update(data);
    sum.value()
}

/// Lower-cased file name, if it is valid UTF-8
fn lower_file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_lowercase)
}

/// Lower-cased extension (text after the last `.`), if any
#[must_use]
pub fn lower_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
}

/// Whether this file is on the ignore list and must be skipped
#[must_use]
pub fn is_ignored(path: &Path) -> bool {
    lower_file_name(path).is_some_and(|name| IGNORED_FILES.contains(&name.as_str()))
}

/// Whether this file is fingerprinted by size only
#[must_use]
pub fn uses_size_fingerprint(path: &Path) -> bool {
    lower_extension(path).is_some_and(|ext| NO_HASH_EXTENSIONS.contains(&ext.as_str()))
}

/// Fingerprint a file
///
/// Returns `None` when the file cannot be read. The failure is logged and the
/// caller treats the file as having no fingerprint, so it never becomes a
/// relocation candidate.
#[must_use]
pub fn fingerprint(path: &Path) -> Option<Fingerprint> {
    match compute(path) {
        Ok(print) => {
            trace!("Fingerprint {} for {}", print, path.display());
            Some(print)
        }
        Err(e) => {
            warn!("Failed to fingerprint {}: {}", path.display(), e);
            None
        }
    }
}

fn compute(path: &Path) -> std::io::Result<Fingerprint> {
    if uses_size_fingerprint(path) {
        return Ok(Fingerprint(std::fs::metadata(path)?.len()));
    }

    let mut file = File::open(path)?;
    let mut sum = Checksum::new();
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let bytes_read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        sum.update(&buffer[..bytes_read]);
    }

    Ok(Fingerprint(u64::from(sum.value())))
}
