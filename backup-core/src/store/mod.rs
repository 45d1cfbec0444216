//! Durable state: per-file fingerprints, run history and the meta table.
//!
//! [`StateStore`] is a cheap-to-clone handle over a small SQLite connection
//! pool. Every mutation is committed before the call returns.

pub mod connection;
pub mod files;
pub mod meta;
pub mod migrate;
pub mod runs;

pub use files::FileRecord;
pub use runs::{BackupRun, BackupType};

use crate::utils::time::{format_timestamp, parse_timestamp};
use crate::{BackupError, Result};
use chrono::{DateTime, Utc};
use connection::{create_pool, create_read_only_pool, DbPool};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use std::path::{Path, PathBuf};

#[derive(Clone)]
pub struct StateStore {
    pool: DbPool,
    path: PathBuf,
}

impl StateStore {
    /// Open (creating if needed) the store at `db_path` and apply the schema.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                BackupError::storage(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let pool = create_pool(&path)?;
        migrate::migrate(&pool)?;
        tracing::debug!(path = %path.display(), "State store opened");

        Ok(Self { pool, path })
    }

    /// Open an existing store for reading only.
    ///
    /// Creates nothing and skips migrations, so it works where the database
    /// directory is not writable. Every mutation on the handle fails with a
    /// storage error.
    pub fn open_read_only(db_path: impl AsRef<Path>) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(BackupError::storage(format!("no state store at {}", path.display())));
        }

        let pool = create_read_only_pool(&path)?;
        tracing::debug!(path = %path.display(), "State store opened read-only");

        Ok(Self { pool, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Advisory lock file guarding executor runs against this store.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    pub fn get_file_record(&self, path: &str) -> Result<Option<FileRecord>> {
        let conn = self.conn()?;
        Ok(files::find_by_path(&conn, path)?)
    }

    /// Insert or replace the record for `record.path`.
    pub fn upsert_file_record(&self, record: &FileRecord) -> Result<()> {
        let conn = self.conn()?;
        Ok(files::upsert(&conn, record)?)
    }

    /// Returns whether a record existed.
    pub fn delete_file_record(&self, path: &str) -> Result<bool> {
        let conn = self.conn()?;
        Ok(files::delete(&conn, path)?)
    }

    /// All records, ordered by path.
    pub fn list_file_records(&self) -> Result<Vec<FileRecord>> {
        let conn = self.conn()?;
        Ok(files::find_all(&conn)?)
    }

    /// Store a run on its own, without touching the meta table.
    pub fn append_backup_run(&self, run: &BackupRun) -> Result<BackupRun> {
        let conn = self.conn()?;
        let id = runs::insert(&conn, run)?;
        Ok(BackupRun {
            id: Some(id),
            ..run.clone()
        })
    }

    /// All runs, oldest first.
    pub fn list_backup_runs(&self) -> Result<Vec<BackupRun>> {
        let conn = self.conn()?;
        Ok(runs::find_all(&conn)?)
    }

    pub fn latest_backup_run(&self, types: &[BackupType]) -> Result<Option<BackupRun>> {
        let conn = self.conn()?;
        Ok(runs::find_latest(&conn, types)?)
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        Ok(meta::get(&conn, key)?)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        Ok(meta::set(&conn, key, value)?)
    }

    /// Parsed `last_backup_date`; an unparseable value reads as absent.
    pub fn last_backup_date(&self) -> Result<Option<DateTime<Utc>>> {
        let value = self.get_meta(meta::LAST_BACKUP_DATE)?;
        Ok(value.as_deref().and_then(|v| {
            let parsed = parse_timestamp(v);
            if parsed.is_none() {
                tracing::warn!(value = %v, "Ignoring unparseable last_backup_date");
            }
            parsed
        }))
    }

    /// Record a finished run.
    ///
    /// The run row and, when `refresh_last_backup` is set, the
    /// `last_backup_date` update commit in one transaction. The meta value
    /// only ever moves forward.
    pub fn complete_run(&self, run: &BackupRun, refresh_last_backup: bool) -> Result<BackupRun> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let id = runs::insert(&tx, run)?;

        if refresh_last_backup {
            let current = meta::get(&tx, meta::LAST_BACKUP_DATE)?
                .as_deref()
                .and_then(parse_timestamp);
            match current {
                Some(current) if current >= run.timestamp => {
                    tracing::warn!(
                        current = %format_timestamp(&current),
                        run = %format_timestamp(&run.timestamp),
                        "Run timestamp is not newer than last_backup_date, keeping the stored value"
                    );
                }
                _ => meta::set(&tx, meta::LAST_BACKUP_DATE, &format_timestamp(&run.timestamp))?,
            }
        }

        tx.commit()?;

        Ok(BackupRun {
            id: Some(id),
            ..run.clone()
        })
    }
}
