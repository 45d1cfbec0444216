//! Copy and remove primitives the executor calls for each file.
//!
//! The executor only talks to the [`FileOps`] trait, so every per-file
//! failure comes back as a plain `io::Error` it can record and skip.

use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::io;
use std::path::Path;

pub trait FileOps {
    /// Copy `src` to `dst`, creating parent directories, and give the copy
    /// the source's modification time. Returns the bytes copied.
    fn copy_file(&self, src: &Path, dst: &Path) -> io::Result<u64>;

    /// Remove the file at `path`.
    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// [`FileOps`] on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl FileOps for LocalFs {
    fn copy_file(&self, src: &Path, dst: &Path) -> io::Result<u64> {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }

        let bytes = fs::copy(src, dst)?;

        let src_meta = fs::metadata(src)?;
        set_file_mtime(dst, FileTime::from_last_modification_time(&src_meta))?;

        Ok(bytes)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// Remove `start` and its ancestors while they are empty, stopping at `root`.
///
/// Best effort: the first directory that cannot be removed ends the walk.
pub fn prune_empty_dirs(start: &Path, root: &Path) {
    let mut current = Some(start);

    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }

        let is_empty = fs::read_dir(dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !is_empty || fs::remove_dir(dir).is_err() {
            break;
        }

        tracing::debug!(dir = %dir.display(), "Removed empty backup directory");
        current = dir.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_creates_parents_and_keeps_mtime() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        let src = temp_dir.path().join("src.txt");
        let dst = temp_dir.path().join("mirror/deep/dst.txt");

        fs::write(&src, b"payload")?;
        set_file_mtime(&src, FileTime::from_unix_time(1_200_000_000, 0))?;

        let bytes = LocalFs.copy_file(&src, &dst)?;

        assert_eq!(bytes, 7);
        assert_eq!(fs::read(&dst)?, b"payload");
        let dst_mtime = FileTime::from_last_modification_time(&fs::metadata(&dst)?);
        assert_eq!(dst_mtime.unix_seconds(), 1_200_000_000);

        Ok(())
    }

    #[test]
    fn test_prune_stops_at_root_and_non_empty_dirs() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();

        fs::create_dir_all(root.join("a/b/c"))?;
        fs::write(root.join("a/keep.txt"), b"x")?;

        prune_empty_dirs(&root.join("a/b/c"), root);

        assert!(!root.join("a/b").exists());
        assert!(root.join("a/keep.txt").exists());
        assert!(root.exists());

        Ok(())
    }
}
