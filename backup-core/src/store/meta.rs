use rusqlite::{params, Connection, OptionalExtension};

/// Key holding the timestamp of the latest successful full or smart run.
pub const LAST_BACKUP_DATE: &str = "last_backup_date";

pub fn get(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM meta WHERE key = ?",
        params![key],
        |row| row.get::<_, String>(0),
    )
    .optional()
}

pub fn set(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO meta (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}
