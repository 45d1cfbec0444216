//! Backup state engine
//!
//! Tracks the backup state of a source tree in SQLite: a size/mtime
//! fingerprint per file, a history of runs and the time of the last
//! successful backup. From that state it drives full, smart (changed files
//! only) and clean (purge orphans) runs against a mirror directory, and
//! answers whether the last backup is overdue.

pub mod config;
pub mod detector;
pub mod engine;
pub mod executor;
pub mod fs;
pub mod lock;
pub mod staleness;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use engine::BackupEngine;
pub use executor::{BackupExecutor, RunOutcome};
pub use staleness::{StalenessReport, StalenessStatus};
pub use store::{BackupRun, BackupType, FileRecord, StateStore};
pub use utils::errors::{BackupError, FileOp, FileOpError};
pub type Result<T> = std::result::Result<T, BackupError>;
