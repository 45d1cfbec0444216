use super::connection::DbPool;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS backups (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  backup_type TEXT NOT NULL,
  timestamp TEXT NOT NULL,
  file_count INTEGER NOT NULL,
  source_path TEXT,
  backup_path TEXT
);

CREATE TABLE IF NOT EXISTS files (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  file_path TEXT NOT NULL UNIQUE,
  file_size INTEGER NOT NULL,
  last_modified REAL NOT NULL,
  last_backup TEXT
);

CREATE INDEX IF NOT EXISTS idx_backups_timestamp ON backups(timestamp);
"#;

pub fn migrate(pool: &DbPool) -> crate::Result<()> {
    tracing::debug!("[DB] Applying schema");

    let conn = pool.get()?;
    conn.execute_batch(SCHEMA)?;

    Ok(())
}
