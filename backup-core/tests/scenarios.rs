//! End-to-end runs of the three policies against real temp directories.

use backup_core::fs::{FileOps, LocalFs};
use backup_core::staleness::{check_staleness_at, evaluate};
use backup_core::{BackupEngine, BackupExecutor, BackupType, FileRecord, StalenessStatus, StateStore};
use chrono::Duration;
use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Workspace {
    _dir: TempDir,
    source: PathBuf,
    mirror: PathBuf,
    engine: BackupEngine,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source");
        let mirror = dir.path().join("mirror");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&mirror).unwrap();
        let store = StateStore::open(dir.path().join("state").join("backups.db")).unwrap();

        Self {
            _dir: dir,
            source,
            mirror,
            engine: BackupEngine::new(store),
        }
    }

    /// Write `size` bytes with a fixed mtime, so rewrites are detectable even
    /// on filesystems with coarse timestamps.
    fn write(&self, name: &str, size: usize, mtime: i64) {
        let path = self.source.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, vec![b'x'; size]).unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
    }

    fn store(&self) -> &StateStore {
        self.engine.store()
    }

    fn records(&self) -> Vec<FileRecord> {
        self.store().list_file_records().unwrap()
    }
}

/// Copies fail with `PermissionDenied` for one file name.
struct DenyCopy(&'static str);

impl FileOps for DenyCopy {
    fn copy_file(&self, src: &Path, dst: &Path) -> io::Result<u64> {
        if src.file_name().is_some_and(|n| n == self.0) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"));
        }
        LocalFs.copy_file(src, dst)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        LocalFs.remove_file(path)
    }
}

#[test]
fn full_smart_clean_walkthrough() {
    let ws = Workspace::new();
    ws.write("a.txt", 100, 1_700_000_000);
    ws.write("b.txt", 200, 1_700_000_000);

    // Full backup of an empty store
    let full = ws.engine.run_full_backup(&ws.source, &ws.mirror).unwrap();
    assert_eq!(full.backup_type, BackupType::Full);
    assert_eq!(full.file_count, 2);
    assert_eq!(ws.records().len(), 2);
    assert_eq!(ws.store().last_backup_date().unwrap(), Some(full.timestamp));

    // Grow a.txt, add c.txt
    let b_before = ws.store().get_file_record("b.txt").unwrap();
    ws.write("a.txt", 150, 1_700_000_100);
    ws.write("c.txt", 50, 1_700_000_100);

    let smart = ws.engine.run_smart_backup(&ws.source, &ws.mirror).unwrap();
    assert_eq!(smart.file_count, 2);
    assert_eq!(ws.store().get_file_record("b.txt").unwrap(), b_before);
    assert_eq!(ws.store().get_file_record("a.txt").unwrap().unwrap().size, 150);
    assert_eq!(fs::metadata(ws.mirror.join("a.txt")).unwrap().len(), 150);
    assert!(ws.mirror.join("c.txt").exists());
    assert_eq!(ws.store().last_backup_date().unwrap(), Some(smart.timestamp));

    // Drop b.txt from the source
    fs::remove_file(ws.source.join("b.txt")).unwrap();

    let clean = ws.engine.run_clean_backup(&ws.source, &ws.mirror).unwrap();
    assert_eq!(clean.file_count, 1);
    assert_eq!(ws.store().get_file_record("b.txt").unwrap(), None);
    assert!(!ws.mirror.join("b.txt").exists());
    assert_eq!(ws.store().last_backup_date().unwrap(), Some(smart.timestamp));

    let history: Vec<BackupType> = ws
        .engine
        .history()
        .unwrap()
        .into_iter()
        .map(|run| run.backup_type)
        .collect();
    assert_eq!(history, vec![BackupType::Full, BackupType::Smart, BackupType::Clean]);
}

#[test]
fn smart_after_full_without_changes_copies_nothing() {
    let ws = Workspace::new();
    for (i, name) in ["one.txt", "dir/two.txt", "dir/deeper/three.bin"].iter().enumerate() {
        ws.write(name, 10 * (i + 1), 1_600_000_000 + i as i64);
    }

    ws.engine.run_full_backup(&ws.source, &ws.mirror).unwrap();
    let before = ws.records();

    let smart = ws.engine.run_smart_backup(&ws.source, &ws.mirror).unwrap();

    assert_eq!(smart.file_count, 0);
    assert_eq!(ws.records(), before);
}

#[test]
fn smart_copies_exactly_new_and_modified_files() {
    let ws = Workspace::new();
    ws.write("keep.txt", 10, 1_600_000_000);
    ws.write("touch.txt", 10, 1_600_000_000);
    ws.write("grow.txt", 10, 1_600_000_000);
    ws.engine.run_full_backup(&ws.source, &ws.mirror).unwrap();

    // Same size, new mtime; new size, same mtime; brand new file
    ws.write("touch.txt", 10, 1_600_000_500);
    ws.write("grow.txt", 11, 1_600_000_000);
    ws.write("sub/new.txt", 5, 1_600_000_000);

    let outcome = ws.engine.run(BackupType::Smart, &ws.source, &ws.mirror).unwrap();

    assert_eq!(outcome.run.file_count, 3);
    assert!(outcome.failures.is_empty());
    let keep = ws.store().get_file_record("keep.txt").unwrap().unwrap();
    let touch = ws.store().get_file_record("touch.txt").unwrap().unwrap();
    assert!(keep.last_backup < touch.last_backup);
    assert_eq!(touch.modified, 1_600_000_500.0);
    assert!(ws.store().get_file_record("sub/new.txt").unwrap().is_some());
}

#[test]
fn clean_deletes_exactly_the_complement_and_is_idempotent() {
    let ws = Workspace::new();
    for name in ["a.txt", "b.txt", "c.txt", "d/e.txt"] {
        ws.write(name, 4, 1_650_000_000);
    }
    ws.engine.run_full_backup(&ws.source, &ws.mirror).unwrap();

    // Source matches the backed-up set
    let noop = ws.engine.run_clean_backup(&ws.source, &ws.mirror).unwrap();
    assert_eq!(noop.file_count, 0);

    fs::remove_file(ws.source.join("b.txt")).unwrap();
    fs::remove_file(ws.source.join("d/e.txt")).unwrap();

    let first = ws.engine.run_clean_backup(&ws.source, &ws.mirror).unwrap();
    assert_eq!(first.file_count, 2);
    let remaining: Vec<String> = ws.records().into_iter().map(|r| r.path).collect();
    assert_eq!(remaining, vec!["a.txt", "c.txt"]);
    assert!(ws.mirror.join("a.txt").exists());
    assert!(!ws.mirror.join("d").exists());

    let second = ws.engine.run_clean_backup(&ws.source, &ws.mirror).unwrap();
    assert_eq!(second.file_count, 0);
}

#[test]
fn single_copy_failure_does_not_fail_the_run() {
    let ws = Workspace::new();
    for name in ["f1.txt", "f2.txt", "f3.txt", "f4.txt", "f5.txt"] {
        ws.write(name, 8, 1_650_000_000);
    }

    // f3.txt already has a record that no longer matches the source
    let stale = FileRecord {
        path: "f3.txt".into(),
        size: 1,
        modified: 1.0,
        last_backup: None,
    };
    ws.store().upsert_file_record(&stale).unwrap();

    let executor = BackupExecutor::with_ops(ws.store(), DenyCopy("f3.txt"));
    let outcome = executor.run_smart(&ws.source, &ws.mirror).unwrap();

    assert_eq!(outcome.run.file_count, 4);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].path, "f3.txt");
    assert_eq!(ws.store().get_file_record("f3.txt").unwrap(), Some(stale));
    assert!(!ws.mirror.join("f3.txt").exists());

    // The next smart run retries it
    let retry = ws.engine.run_smart_backup(&ws.source, &ws.mirror).unwrap();
    assert_eq!(retry.file_count, 1);
}

#[test]
fn staleness_tracks_full_and_smart_runs_only() {
    let ws = Workspace::new();
    ws.write("a.txt", 1, 1_650_000_000);

    let now = chrono::Utc::now();
    assert_eq!(
        check_staleness_at(ws.store(), now, 3).unwrap().status,
        StalenessStatus::NoHistory
    );

    ws.engine.run_clean_backup(&ws.source, &ws.mirror).unwrap();
    assert_eq!(
        ws.engine.check_staleness().unwrap().status,
        StalenessStatus::NoHistory
    );

    let full = ws.engine.run_full_backup(&ws.source, &ws.mirror).unwrap();
    let report = ws.engine.check_staleness().unwrap();
    assert_eq!(report.status, StalenessStatus::Ok);
    assert_eq!(report.last_backup_date, Some(full.timestamp));
    assert_eq!(report.next_check, Some(full.timestamp + Duration::days(3)));

    let later = full.timestamp + Duration::days(4);
    let report = check_staleness_at(ws.store(), later, 3).unwrap();
    assert_eq!(report.status, StalenessStatus::Overdue);
    assert_eq!(report.days_since, Some(4));
}

#[test]
fn staleness_classification_over_a_range_of_ages() {
    let last = chrono::Utc::now();
    for hours in [0i64, 1, 47, 71, 72, 95, 96, 97, 24 * 30] {
        let report = evaluate(Some(last), last + Duration::hours(hours), 3);
        let expected = if hours / 24 > 3 {
            StalenessStatus::Overdue
        } else {
            StalenessStatus::Ok
        };
        assert_eq!(report.status, expected, "after {hours}h");
    }
}

#[test]
#[cfg(unix)]
fn unreadable_directory_is_skipped_not_orphaned() {
    use std::os::unix::fs::PermissionsExt;

    let ws = Workspace::new();
    ws.write("open.txt", 3, 1_650_000_000);
    ws.write("locked/inner.txt", 3, 1_650_000_000);
    ws.engine.run_full_backup(&ws.source, &ws.mirror).unwrap();

    let locked = ws.source.join("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Root ignores directory permissions; nothing to observe in that case
    let readable_anyway = fs::read_dir(&locked).is_ok();

    let outcome = ws.engine.run(BackupType::Clean, &ws.source, &ws.mirror);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    let outcome = outcome.unwrap();

    assert_eq!(outcome.run.file_count, 0);
    assert!(ws.store().get_file_record("locked/inner.txt").unwrap().is_some());
    if !readable_anyway {
        assert_eq!(outcome.skipped.len(), 1);
    }
}
