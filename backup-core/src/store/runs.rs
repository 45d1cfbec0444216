use crate::utils::time::{format_timestamp, parse_timestamp};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backup policy a run executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    Full,
    Smart,
    Clean,
}

impl BackupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupType::Full => "full",
            BackupType::Smart => "smart",
            BackupType::Clean => "clean",
        }
    }

    /// Whether a completed run of this type counts as "a backup happened".
    pub fn refreshes_last_backup(&self) -> bool {
        matches!(self, BackupType::Full | BackupType::Smart)
    }
}

impl fmt::Display for BackupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackupType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(BackupType::Full),
            "smart" | "incremental" => Ok(BackupType::Smart),
            "clean" => Ok(BackupType::Clean),
            other => Err(format!("unknown backup type '{other}'")),
        }
    }
}

/// One completed executor invocation. Never modified once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRun {
    /// Row id, `None` until the run is stored
    pub id: Option<i64>,
    pub backup_type: BackupType,
    pub timestamp: DateTime<Utc>,
    /// Files copied (full/smart) or removed (clean)
    pub file_count: u64,
    pub source_path: String,
    pub backup_path: String,
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn row_to_run(row: &Row) -> rusqlite::Result<BackupRun> {
    let backup_type: String = row.get("backup_type")?;
    let timestamp: String = row.get("timestamp")?;
    let file_count: i64 = row.get("file_count")?;

    Ok(BackupRun {
        id: row.get("id")?,
        backup_type: backup_type.parse().map_err(|e| conversion_error(1, e))?,
        timestamp: parse_timestamp(&timestamp)
            .ok_or_else(|| conversion_error(2, format!("invalid timestamp '{timestamp}'")))?,
        file_count: u64::try_from(file_count).unwrap_or(0),
        source_path: row.get::<_, Option<String>>("source_path")?.unwrap_or_default(),
        backup_path: row.get::<_, Option<String>>("backup_path")?.unwrap_or_default(),
    })
}

pub fn find_all(conn: &Connection) -> rusqlite::Result<Vec<BackupRun>> {
    let mut stmt = conn.prepare(
        "SELECT id, backup_type, timestamp, file_count, source_path, backup_path
         FROM backups ORDER BY timestamp ASC, id ASC",
    )?;
    let rows = stmt.query_map([], row_to_run)?;
    rows.collect()
}

/// Most recent run whose type is one of `types`.
pub fn find_latest(conn: &Connection, types: &[BackupType]) -> rusqlite::Result<Option<BackupRun>> {
    if types.is_empty() {
        return Ok(None);
    }

    let placeholders = vec!["?"; types.len()].join(", ");
    let sql = format!(
        "SELECT id, backup_type, timestamp, file_count, source_path, backup_path
         FROM backups WHERE backup_type IN ({placeholders})
         ORDER BY timestamp DESC, id DESC LIMIT 1"
    );
    conn.query_row(&sql, params_from_iter(types.iter().map(|t| t.as_str())), row_to_run)
        .optional()
}

pub fn insert(conn: &Connection, run: &BackupRun) -> rusqlite::Result<i64> {
    let file_count = i64::try_from(run.file_count).unwrap_or(i64::MAX);
    conn.execute(
        "INSERT INTO backups (backup_type, timestamp, file_count, source_path, backup_path)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            run.backup_type.as_str(),
            format_timestamp(&run.timestamp),
            file_count,
            run.source_path,
            run.backup_path
        ],
    )?;
    Ok(conn.last_insert_rowid())
}
