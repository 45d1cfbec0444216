use crate::utils::time::{format_timestamp, parse_timestamp};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// Last-known state of one tracked source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path relative to the source root, `/`-separated
    pub path: String,

    /// File size in bytes
    pub size: u64,

    /// Source modification time (seconds since Unix epoch)
    pub modified: f64,

    /// When the file was last copied to the backup location
    pub last_backup: Option<DateTime<Utc>>,
}

fn row_to_record(row: &Row) -> rusqlite::Result<FileRecord> {
    let size: i64 = row.get("file_size")?;
    let last_backup: Option<String> = row.get("last_backup")?;
    Ok(FileRecord {
        path: row.get("file_path")?,
        size: u64::try_from(size).unwrap_or(0),
        modified: row.get("last_modified")?,
        last_backup: last_backup.as_deref().and_then(parse_timestamp),
    })
}

pub fn find_by_path(conn: &Connection, path: &str) -> rusqlite::Result<Option<FileRecord>> {
    conn.query_row(
        "SELECT file_path, file_size, last_modified, last_backup FROM files WHERE file_path = ?",
        params![path],
        row_to_record,
    )
    .optional()
}

pub fn find_all(conn: &Connection) -> rusqlite::Result<Vec<FileRecord>> {
    let mut stmt = conn.prepare(
        "SELECT file_path, file_size, last_modified, last_backup FROM files ORDER BY file_path",
    )?;
    let rows = stmt.query_map([], row_to_record)?;
    rows.collect()
}

pub fn upsert(conn: &Connection, record: &FileRecord) -> rusqlite::Result<()> {
    let size = i64::try_from(record.size).unwrap_or(i64::MAX);
    let last_backup = record.last_backup.as_ref().map(format_timestamp);
    conn.execute(
        "INSERT INTO files (file_path, file_size, last_modified, last_backup) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(file_path) DO UPDATE SET
           file_size = excluded.file_size,
           last_modified = excluded.last_modified,
           last_backup = excluded.last_backup",
        params![record.path, size, record.modified, last_backup],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, path: &str) -> rusqlite::Result<bool> {
    let changes = conn.execute("DELETE FROM files WHERE file_path = ?", params![path])?;
    Ok(changes > 0)
}
