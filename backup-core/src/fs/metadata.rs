//! Size/mtime fingerprints used for change detection.
//!
//! Two files with the same size and modification time are treated as the
//! same content. Nothing is hashed, so a rewrite that keeps both values (clock
//! skew, deliberate tampering) goes unnoticed.

use crate::store::FileRecord;
use std::fs::{self, Metadata};
use std::path::Path;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fingerprint {
    /// File size in bytes
    pub size: u64,

    /// Last modified time (seconds since Unix epoch, sub-second precision)
    pub modified: f64,
}

impl Fingerprint {
    pub fn from_metadata(metadata: &Metadata) -> std::io::Result<Self> {
        let modified = match metadata.modified()?.duration_since(SystemTime::UNIX_EPOCH) {
            Ok(after) => after.as_secs_f64(),
            Err(before) => -before.duration().as_secs_f64(),
        };

        Ok(Self {
            size: metadata.len(),
            modified,
        })
    }

    /// Fingerprint of the file at `path`, following symlinks.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        Self::from_metadata(&fs::metadata(path)?)
    }

    /// True when either the size or the mtime differs from the record.
    pub fn differs_from(&self, record: &FileRecord) -> bool {
        self.size != record.size || self.modified != record.modified
    }
}
