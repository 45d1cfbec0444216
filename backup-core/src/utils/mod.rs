//! Utility modules for the backup engine.

pub mod errors;
pub mod time;

pub use errors::{BackupError, FileOp, FileOpError, Result};
