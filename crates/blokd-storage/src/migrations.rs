use anyhow::Result;
use rusqlite::Connection;

/// Initialize database schema
///
/// # Errors
///
/// Returns an error if database table creation or index creation fails
pub fn init_schema(conn: &Connection) -> Result<()> {
    // Blocked apps table - the user-selected set of package identifiers
    conn.execute(
        "CREATE TABLE IF NOT EXISTS blocked_apps (
            package TEXT PRIMARY KEY
        )",
        [],
    )?;

    // Session history table - one row per monitoring session
    conn.execute(
        "CREATE TABLE IF NOT EXISTS session_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            start_time TEXT NOT NULL,
            end_time TEXT,
            blocked_attempts INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_session_history_start_time
         ON session_history (start_time DESC)",
        [],
    )?;

    Ok(())
}
