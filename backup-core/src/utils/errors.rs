//! Error types for the backup engine.
//!
//! [`BackupError`] is fatal to a run and is returned to the caller.
//! [`FileOpError`] covers a single file and never escapes a run: the executor
//! records it in the run outcome and moves on.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Storage error: {reason}")]
    Storage { reason: String },

    #[error("Path error: {}: {reason}", .path.display())]
    Path { path: PathBuf, reason: String },

    #[error("Another backup run is already active (lock held on {})", .lock_path.display())]
    ConcurrentRun { lock_path: PathBuf },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BackupError {
    pub fn storage(reason: impl Into<String>) -> Self {
        Self::Storage {
            reason: reason.into(),
        }
    }

    pub fn path(path: &Path, reason: impl Into<String>) -> Self {
        Self::Path {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

impl From<rusqlite::Error> for BackupError {
    fn from(err: rusqlite::Error) -> Self {
        Self::storage(err.to_string())
    }
}

impl From<r2d2::Error> for BackupError {
    fn from(err: r2d2::Error) -> Self {
        Self::storage(format!("connection pool: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;

/// The filesystem operation a [`FileOpError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    Copy,
    Stat,
    Remove,
}

impl fmt::Display for FileOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileOp::Copy => "copy",
            FileOp::Stat => "stat",
            FileOp::Remove => "remove",
        };
        f.write_str(name)
    }
}

/// A single-file copy or delete failure, recovered inside the run.
#[derive(Error, Debug)]
#[error("Failed to {op} {path}: {source}")]
pub struct FileOpError {
    pub op: FileOp,
    /// Source-relative path of the file
    pub path: String,
    pub source: io::Error,
}

impl FileOpError {
    pub fn new(op: FileOp, path: impl Into<String>, source: io::Error) -> Self {
        Self {
            op,
            path: path.into(),
            source,
        }
    }
}
