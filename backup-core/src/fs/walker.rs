//! Source tree traversal.
//!
//! Walks the source root and fingerprints every regular file. Entries that
//! cannot be read are reported as skipped and the walk carries on.

use super::metadata::Fingerprint;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Options for directory walking
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Follow symbolic links
    pub follow_links: bool,

    /// File names containing any of these are left out, with their subtrees
    pub exclude_patterns: Vec<String>,

    /// Absolute paths whose subtrees are never entered
    pub prune: Vec<PathBuf>,
}

/// A regular file found under the source root
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Full path to the file
    pub path: PathBuf,

    /// Relative path from the root
    pub relative: PathBuf,

    /// `relative` as a `/`-separated key, as stored in the state store
    pub key: String,

    pub fingerprint: Fingerprint,
}

/// A path the walk could not read
#[derive(Debug, Clone)]
pub struct SkippedEntry {
    pub path: PathBuf,

    /// Key of the path relative to the root; `None` when it is the root
    /// itself or lies outside it
    pub key: Option<String>,

    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ScanResult {
    /// Files sorted by path
    pub files: Vec<SourceFile>,
    pub skipped: Vec<SkippedEntry>,
}

/// Turn a relative path into a store key.
pub fn path_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn relative_key(path: &Path, root: &Path) -> Option<String> {
    path.strip_prefix(root)
        .ok()
        .filter(|rel| !rel.as_os_str().is_empty())
        .map(path_key)
}

/// Walk `root` and fingerprint every regular file under it.
///
/// Symlinks to files are resolved; links to directories and broken links are
/// ignored. Unreadable directories and files become [`SkippedEntry`] items.
pub fn scan_source(root: &Path, options: &WalkOptions) -> ScanResult {
    let mut result = ScanResult::default();

    let walker = WalkDir::new(root)
        .follow_links(options.follow_links)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !should_skip(entry, options));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                tracing::warn!(path = %path.display(), error = %err, "Skipping unreadable entry");
                result.skipped.push(SkippedEntry {
                    key: relative_key(&path, root),
                    path,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }

        match fingerprint_entry(&entry) {
            Ok(Some(fingerprint)) => {
                let path = entry.path().to_path_buf();
                let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
                result.files.push(SourceFile {
                    key: path_key(&relative),
                    relative,
                    path,
                    fingerprint,
                });
            }
            Ok(None) => {
                tracing::debug!(path = %entry.path().display(), "Ignoring non-regular file");
            }
            Err(err) => {
                tracing::warn!(path = %entry.path().display(), error = %err, "Skipping unreadable file");
                result.skipped.push(SkippedEntry {
                    path: entry.path().to_path_buf(),
                    key: relative_key(entry.path(), root),
                    reason: err.to_string(),
                });
            }
        }
    }

    result
}

/// Fingerprint a walked entry, or `None` when it is not a backup candidate.
fn fingerprint_entry(entry: &DirEntry) -> std::io::Result<Option<Fingerprint>> {
    let file_type = entry.file_type();

    if file_type.is_symlink() {
        // Resolve to the target; directories and broken links are not files
        return match fs::metadata(entry.path()) {
            Ok(resolved) if resolved.is_file() => Fingerprint::from_metadata(&resolved).map(Some),
            Ok(_) => Ok(None),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        };
    }

    if !file_type.is_file() {
        return Ok(None);
    }

    let metadata = entry.metadata().map_err(std::io::Error::from)?;
    Fingerprint::from_metadata(&metadata).map(Some)
}

/// Check if a directory entry should be left out of the walk
fn should_skip(entry: &DirEntry, options: &WalkOptions) -> bool {
    if options.prune.iter().any(|p| entry.path() == p) {
        return true;
    }

    let file_name = entry.file_name().to_string_lossy();
    options
        .exclude_patterns
        .iter()
        .any(|pattern| file_name.contains(pattern.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn keys(result: &ScanResult) -> Vec<&str> {
        result.files.iter().map(|f| f.key.as_str()).collect()
    }

    #[test]
    fn test_walk_empty_directory() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let result = scan_source(temp_dir.path(), &WalkOptions::default());
        assert!(result.files.is_empty());
        assert!(result.skipped.is_empty());
        Ok(())
    }

    #[test]
    fn test_walk_with_subdirectories() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;

        fs::create_dir(temp_dir.path().join("subdir"))?;
        fs::write(temp_dir.path().join("file1.txt"), b"content1")?;
        fs::write(temp_dir.path().join("subdir/file2.txt"), b"content22")?;

        let result = scan_source(temp_dir.path(), &WalkOptions::default());
        assert_eq!(keys(&result), vec!["file1.txt", "subdir/file2.txt"]);
        assert_eq!(result.files[1].fingerprint.size, 9);
        assert_eq!(result.files[1].relative, PathBuf::from("subdir").join("file2.txt"));

        Ok(())
    }

    #[test]
    fn test_exclude_patterns() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;

        fs::create_dir(temp_dir.path().join("node_modules"))?;
        fs::write(temp_dir.path().join("node_modules/dep.js"), b"exclude")?;
        fs::write(temp_dir.path().join("file.txt"), b"keep")?;
        fs::write(temp_dir.path().join(".DS_Store"), b"exclude")?;

        let options = WalkOptions {
            exclude_patterns: vec!["node_modules".into(), ".DS_Store".into()],
            ..WalkOptions::default()
        };
        let result = scan_source(temp_dir.path(), &options);
        assert_eq!(keys(&result), vec!["file.txt"]);

        Ok(())
    }

    #[test]
    fn test_pruned_subtree_is_not_entered() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;

        fs::create_dir(temp_dir.path().join("mirror"))?;
        fs::write(temp_dir.path().join("mirror/copy.txt"), b"copy")?;
        fs::write(temp_dir.path().join("file.txt"), b"keep")?;

        let options = WalkOptions {
            prune: vec![temp_dir.path().join("mirror")],
            ..WalkOptions::default()
        };
        let result = scan_source(temp_dir.path(), &options);
        assert_eq!(keys(&result), vec!["file.txt"]);

        Ok(())
    }

    #[test]
    #[cfg(unix)]
    fn test_symlinks_to_files_are_resolved() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;

        fs::write(temp_dir.path().join("target.txt"), b"12345")?;
        fs::create_dir(temp_dir.path().join("dir"))?;
        std::os::unix::fs::symlink("target.txt", temp_dir.path().join("link.txt"))?;
        std::os::unix::fs::symlink("dir", temp_dir.path().join("dirlink"))?;
        std::os::unix::fs::symlink("missing", temp_dir.path().join("broken"))?;

        let result = scan_source(temp_dir.path(), &WalkOptions::default());
        assert_eq!(keys(&result), vec!["link.txt", "target.txt"]);
        assert_eq!(result.files[0].fingerprint.size, 5);
        assert!(result.skipped.is_empty());

        Ok(())
    }

    #[test]
    fn test_path_key_uses_forward_slashes() {
        let relative = Path::new("a").join("b").join("c.txt");
        assert_eq!(path_key(&relative), "a/b/c.txt");
    }
}
