//! Change detection against stored fingerprints.
//!
//! Classification is read-only: the store is only queried, never written.

use crate::fs::walker::{scan_source, ScanResult, SkippedEntry, SourceFile, WalkOptions};
use crate::store::{FileRecord, StateStore};
use crate::Result;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Disjoint classification of a source tree against the stored records.
#[derive(Debug, Default)]
pub struct ChangeSet {
    /// Source files with no record
    pub new: Vec<SourceFile>,

    /// Source files whose size or mtime differs from the record
    pub modified: Vec<SourceFile>,

    pub unchanged: Vec<SourceFile>,

    /// Records with no file under the source root
    pub orphaned: Vec<FileRecord>,

    /// Unreadable paths, left out of every other list
    pub skipped: Vec<SkippedEntry>,
}

impl ChangeSet {
    /// Files a smart run has to copy.
    pub fn changed(&self) -> impl Iterator<Item = &SourceFile> {
        self.new.iter().chain(self.modified.iter())
    }
}

/// Scan `root` and classify it against the store's records.
pub fn detect_changes(store: &StateStore, root: &Path, options: &WalkOptions) -> Result<ChangeSet> {
    let records = store.list_file_records()?;
    let scan = scan_source(root, options);
    let changes = classify(scan, records);

    tracing::info!(
        new = changes.new.len(),
        modified = changes.modified.len(),
        unchanged = changes.unchanged.len(),
        orphaned = changes.orphaned.len(),
        skipped = changes.skipped.len(),
        "Change detection complete"
    );

    Ok(changes)
}

/// Classify a finished scan against a record snapshot.
///
/// A record under a skipped path is neither orphaned nor anything else: the
/// file may still exist, it just could not be read this time.
pub fn classify(scan: ScanResult, records: Vec<FileRecord>) -> ChangeSet {
    let mut by_path: HashMap<String, FileRecord> =
        records.into_iter().map(|r| (r.path.clone(), r)).collect();

    let mut changes = ChangeSet {
        skipped: scan.skipped,
        ..ChangeSet::default()
    };

    let mut seen = HashSet::with_capacity(scan.files.len());
    for file in scan.files {
        seen.insert(file.key.clone());
        match by_path.get(&file.key) {
            None => changes.new.push(file),
            Some(record) if file.fingerprint.differs_from(record) => changes.modified.push(file),
            Some(_) => changes.unchanged.push(file),
        }
    }

    by_path.retain(|path, _| !seen.contains(path));

    let mut orphaned: Vec<FileRecord> = by_path
        .into_values()
        .filter(|record| !is_shadowed(&record.path, &changes.skipped))
        .collect();
    orphaned.sort_by(|a, b| a.path.cmp(&b.path));
    changes.orphaned = orphaned;

    changes
}

/// True when `path` is at or under one of the skipped entries.
fn is_shadowed(path: &str, skipped: &[SkippedEntry]) -> bool {
    skipped.iter().any(|entry| match &entry.key {
        None => true,
        Some(key) => {
            path == key
                || path
                    .strip_prefix(key.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        }
    })
}
