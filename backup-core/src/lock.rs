//! Single-writer guard for executor runs.

use crate::{BackupError, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Exclusive advisory lock held for the duration of one run.
///
/// The OS drops the lock when the handle closes, so a killed process never
/// leaves a stale lock behind.
#[derive(Debug)]
pub struct RunLock {
    _file: File,
    path: PathBuf,
}

impl RunLock {
    /// Take the lock at `lock_path` without waiting.
    pub fn acquire(lock_path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(lock_path)
            .map_err(|e| {
                BackupError::storage(format!("cannot open lock file {}: {e}", lock_path.display()))
            })?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(true) => {
                tracing::debug!(path = %lock_path.display(), "Run lock acquired");
                Ok(Self {
                    _file: file,
                    path: lock_path.to_path_buf(),
                })
            }
            Ok(false) => Err(BackupError::ConcurrentRun {
                lock_path: lock_path.to_path_buf(),
            }),
            Err(e) => Err(BackupError::storage(format!(
                "cannot lock {}: {e}",
                lock_path.display()
            ))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("backups.db.lock");

        let first = RunLock::acquire(&lock_path).unwrap();
        assert_eq!(first.path(), lock_path);

        let second = RunLock::acquire(&lock_path);
        assert!(matches!(second, Err(BackupError::ConcurrentRun { .. })));

        drop(first);
        assert!(RunLock::acquire(&lock_path).is_ok());
    }
}
