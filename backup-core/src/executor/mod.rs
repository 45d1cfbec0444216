//! Backup executor - runs the full, smart and clean policies.
//!
//! Every policy follows the same shape:
//! - validate the source and backup paths (nothing touched on failure)
//! - take the store's run lock
//! - scan / classify, then copy or delete file by file, committing each
//!   file's record as soon as its operation succeeds
//! - record the run (and refresh `last_backup_date` for full/smart) once all
//!   files are done
//!
//! A single file failing is logged, collected into the outcome and skipped.
//! Only path, lock and storage errors end a run early.

use crate::detector::detect_changes;
use crate::fs::metadata::Fingerprint;
use crate::fs::ops::{prune_empty_dirs, FileOps, LocalFs};
use crate::fs::walker::{scan_source, SkippedEntry, SourceFile, WalkOptions};
use crate::lock::RunLock;
use crate::store::{BackupRun, BackupType, FileRecord, StateStore};
use crate::utils::errors::{FileOp, FileOpError};
use crate::utils::time;
use crate::{BackupError, Result};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Result of a completed run.
#[derive(Debug)]
pub struct RunOutcome {
    /// The stored run record
    pub run: BackupRun,

    /// Files whose copy or delete failed; their records were left untouched
    pub failures: Vec<FileOpError>,

    /// Source paths the scan could not read
    pub skipped: Vec<SkippedEntry>,

    pub duration: Duration,
}

/// Per-run counters
#[derive(Default)]
struct Tally {
    succeeded: u64,
    failures: Vec<FileOpError>,
    skipped: Vec<SkippedEntry>,
}

impl Tally {
    fn record_failure(&mut self, err: FileOpError) {
        warn!(path = %err.path, op = %err.op, error = %err.source, "File operation failed, skipping");
        self.failures.push(err);
    }
}

/// Main backup executor
pub struct BackupExecutor<'a> {
    store: &'a StateStore,
    ops: Box<dyn FileOps + 'a>,
    walk: WalkOptions,
}

impl<'a> BackupExecutor<'a> {
    /// Executor working on the local filesystem
    pub fn new(store: &'a StateStore) -> Self {
        Self::with_ops(store, LocalFs)
    }

    /// Executor using custom copy/remove primitives
    pub fn with_ops(store: &'a StateStore, ops: impl FileOps + 'a) -> Self {
        Self {
            store,
            ops: Box::new(ops),
            walk: WalkOptions::default(),
        }
    }

    pub fn walk_options(mut self, walk: WalkOptions) -> Self {
        self.walk = walk;
        self
    }

    pub fn run_full(&self, source: &Path, dest: &Path) -> Result<RunOutcome> {
        self.execute(BackupType::Full, source, dest)
    }

    pub fn run_smart(&self, source: &Path, dest: &Path) -> Result<RunOutcome> {
        self.execute(BackupType::Smart, source, dest)
    }

    pub fn run_clean(&self, source: &Path, dest: &Path) -> Result<RunOutcome> {
        self.execute(BackupType::Clean, source, dest)
    }

    /// Execute one run of `backup_type` from `source` into `dest`.
    pub fn execute(&self, backup_type: BackupType, source: &Path, dest: &Path) -> Result<RunOutcome> {
        let start_time = Instant::now();

        let (source, dest) = validate_paths(source, dest)?;
        let _lock = RunLock::acquire(&self.store.lock_path())?;

        info!(
            backup_type = %backup_type,
            source = %source.display(),
            dest = %dest.display(),
            "Starting backup run"
        );

        let tally = match backup_type {
            BackupType::Full => self.full(&source, &dest),
            BackupType::Smart => self.smart(&source, &dest),
            BackupType::Clean => self.clean(&source, &dest),
        }
        .inspect_err(|e| error!(backup_type = %backup_type, error = %e, "Backup run aborted"))?;

        let run = BackupRun {
            id: None,
            backup_type,
            timestamp: time::now(),
            file_count: tally.succeeded,
            source_path: source.display().to_string(),
            backup_path: dest.display().to_string(),
        };
        let run = self
            .store
            .complete_run(&run, backup_type.refreshes_last_backup())
            .inspect_err(|e| error!(backup_type = %backup_type, error = %e, "Failed to record backup run"))?;

        let duration = start_time.elapsed();
        info!(
            backup_type = %backup_type,
            file_count = run.file_count,
            failed = tally.failures.len(),
            skipped = tally.skipped.len(),
            duration_ms = duration.as_millis() as u64,
            "Backup run complete"
        );

        Ok(RunOutcome {
            run,
            failures: tally.failures,
            skipped: tally.skipped,
            duration,
        })
    }

    /// Copy every source file, regardless of stored records.
    fn full(&self, source: &Path, dest: &Path) -> Result<Tally> {
        let scan = scan_source(source, &self.walk_for(source, dest));
        info!("Full backup: {} files to copy", scan.files.len());

        let mut tally = Tally {
            skipped: scan.skipped,
            ..Tally::default()
        };
        for file in &scan.files {
            self.back_up(file, dest, &mut tally)?;
        }

        Ok(tally)
    }

    /// Copy only new and modified files.
    fn smart(&self, source: &Path, dest: &Path) -> Result<Tally> {
        let changes = detect_changes(self.store, source, &self.walk_for(source, dest))?;
        info!(
            "Smart backup: {} new, {} modified, {} unchanged",
            changes.new.len(),
            changes.modified.len(),
            changes.unchanged.len()
        );

        let mut tally = Tally::default();
        for file in changes.changed() {
            self.back_up(file, dest, &mut tally)?;
        }
        tally.skipped = changes.skipped;

        Ok(tally)
    }

    /// Remove backup copies and records of files gone from the source.
    fn clean(&self, source: &Path, dest: &Path) -> Result<Tally> {
        let changes = detect_changes(self.store, source, &self.walk_for(source, dest))?;
        info!("Clean: {} orphaned records", changes.orphaned.len());

        let mut tally = Tally::default();
        for record in &changes.orphaned {
            match self.purge(record, dest) {
                Ok(()) => {
                    self.store.delete_file_record(&record.path)?;
                    tally.succeeded += 1;
                }
                Err(err) => tally.record_failure(err),
            }
        }
        tally.skipped = changes.skipped;

        Ok(tally)
    }

    /// Copy one file and commit its record. Storage errors abort the run.
    fn back_up(&self, file: &SourceFile, dest: &Path, tally: &mut Tally) -> Result<()> {
        match self.copy_to_mirror(file, dest) {
            Ok(record) => {
                self.store.upsert_file_record(&record)?;
                debug!(path = %file.key, size = record.size, "Copied");
                tally.succeeded += 1;
            }
            Err(err) => tally.record_failure(err),
        }
        Ok(())
    }

    fn copy_to_mirror(&self, file: &SourceFile, dest: &Path) -> std::result::Result<FileRecord, FileOpError> {
        let target = dest.join(&file.relative);
        self.ops
            .copy_file(&file.path, &target)
            .map_err(|e| FileOpError::new(FileOp::Copy, &file.key, e))?;

        // Record the source as it stands after the copy
        let fingerprint = Fingerprint::from_path(&file.path)
            .map_err(|e| FileOpError::new(FileOp::Stat, &file.key, e))?;

        Ok(FileRecord {
            path: file.key.clone(),
            size: fingerprint.size,
            modified: fingerprint.modified,
            last_backup: Some(time::now()),
        })
    }

    /// Delete the backup copy of `record`. An already-missing copy is fine.
    fn purge(&self, record: &FileRecord, dest: &Path) -> std::result::Result<(), FileOpError> {
        let relative = mirror_relative(&record.path).ok_or_else(|| {
            FileOpError::new(
                FileOp::Remove,
                &record.path,
                io::Error::new(io::ErrorKind::InvalidInput, "record path escapes the backup root"),
            )
        })?;
        let target = dest.join(relative);

        match self.ops.remove_file(&target) {
            Ok(()) => {
                debug!(path = %record.path, "Removed backup copy");
                if let Some(parent) = target.parent() {
                    prune_empty_dirs(parent, dest);
                }
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %record.path, "Backup copy already absent");
                Ok(())
            }
            Err(e) => Err(FileOpError::new(FileOp::Remove, &record.path, e)),
        }
    }

    /// Walk options for this run; a backup root nested in the source is pruned.
    fn walk_for(&self, source: &Path, dest: &Path) -> WalkOptions {
        let mut walk = self.walk.clone();
        if dest.starts_with(source) {
            walk.prune.push(dest.to_path_buf());
        }
        walk
    }
}

/// Rebuild a platform path from a stored key, refusing anything that could
/// leave the backup root.
fn mirror_relative(key: &str) -> Option<PathBuf> {
    let parts: Vec<&str> = key.split('/').filter(|part| !part.is_empty()).collect();
    if parts.is_empty() || parts.iter().any(|part| *part == "." || *part == "..") {
        return None;
    }

    let relative: PathBuf = parts.iter().collect();
    let is_plain = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    is_plain.then_some(relative)
}

fn canonical_dir(path: &Path, role: &str) -> Result<PathBuf> {
    let canonical = path
        .canonicalize()
        .map_err(|e| BackupError::path(path, format!("{role} path is not accessible: {e}")))?;
    if !canonical.is_dir() {
        return Err(BackupError::path(path, format!("{role} path is not a directory")));
    }
    Ok(canonical)
}

/// Check both paths before anything else happens. Returns them canonicalized.
fn validate_paths(source: &Path, dest: &Path) -> Result<(PathBuf, PathBuf)> {
    let source = canonical_dir(source, "source")?;
    std::fs::read_dir(&source)
        .map_err(|e| BackupError::path(&source, format!("source is not readable: {e}")))?;

    let dest = canonical_dir(dest, "backup")?;
    tempfile::Builder::new()
        .prefix(".backup-write-check")
        .tempfile_in(&dest)
        .map_err(|e| BackupError::path(&dest, format!("backup location is not writable: {e}")))?;

    if source == dest {
        return Err(BackupError::path(
            &dest,
            "source and backup location are the same directory",
        ));
    }

    Ok((source, dest))
}
