use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::helpers::parse_datetime;
use super::Database;
use crate::models::SessionHistory;

impl Database {
    /// Create a new session row and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub fn create_session(&self, start_time: DateTime<Utc>) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO session_history (start_time, end_time, blocked_attempts)
             VALUES (?1, NULL, 0)",
            params![start_time.to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Increment the blocked-attempt counter for an ongoing session.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub fn increment_session_attempts(&self, session_id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE session_history SET blocked_attempts = blocked_attempts + 1
             WHERE id = ?1",
            params![session_id],
        )?;
        Ok(())
    }

    /// Set the end time of a session. The row is immutable afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub fn finalize_session(&self, session_id: i64, end_time: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE session_history SET end_time = ?1 WHERE id = ?2 AND end_time IS NULL",
            params![end_time.to_rfc3339(), session_id],
        )?;
        Ok(())
    }

    /// Read all sessions, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_sessions(&self) -> Result<Vec<SessionHistory>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, start_time, end_time, blocked_attempts
             FROM session_history ORDER BY start_time DESC, id DESC",
        )?;

        let sessions = stmt
            .query_map([], Self::row_to_session)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(sessions)
    }

    /// Look up a single session by id. An unknown id is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_session_by_id(&self, session_id: i64) -> Result<Option<SessionHistory>> {
        let session = self
            .conn
            .query_row(
                "SELECT id, start_time, end_time, blocked_attempts
                 FROM session_history WHERE id = ?1",
                params![session_id],
                Self::row_to_session,
            )
            .optional()?;

        Ok(session)
    }

    fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionHistory> {
        let start: String = row.get(1)?;
        let end: Option<String> = row.get(2)?;
        Ok(SessionHistory {
            id: row.get(0)?,
            start_time: parse_datetime(&start)?,
            end_time: end.as_deref().map(parse_datetime).transpose()?,
            blocked_attempts: row.get(3)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn session_lifecycle() {
        let db = Database::in_memory().unwrap();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let id = db.create_session(start).unwrap();

        db.increment_session_attempts(id).unwrap();
        db.increment_session_attempts(id).unwrap();

        let ongoing = db.get_session_by_id(id).unwrap().unwrap();
        assert_eq!(ongoing.start_time, start);
        assert_eq!(ongoing.end_time, None);
        assert_eq!(ongoing.blocked_attempts, 2);

        let end = Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap();
        db.finalize_session(id, end).unwrap();

        let finished = db.get_session_by_id(id).unwrap().unwrap();
        assert_eq!(finished.end_time, Some(end));
        assert_eq!(finished.duration_seconds(), Some(3600));
    }

    #[test]
    fn sessions_read_most_recent_first() {
        let db = Database::in_memory().unwrap();
        let older = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();

        let older_id = db.create_session(older).unwrap();
        let newer_id = db.create_session(newer).unwrap();

        let sessions = db.get_sessions().unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, newer_id);
        assert_eq!(sessions[1].id, older_id);
    }

    #[test]
    fn unknown_session_id_is_none() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.get_session_by_id(42).unwrap(), None);
    }

    #[test]
    fn finalize_does_not_rewrite_a_finished_session() {
        let db = Database::in_memory().unwrap();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let first_end = Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap();
        let second_end = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        let id = db.create_session(start).unwrap();
        db.finalize_session(id, first_end).unwrap();
        db.finalize_session(id, second_end).unwrap();

        let session = db.get_session_by_id(id).unwrap().unwrap();
        assert_eq!(session.end_time, Some(first_end));
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blokd.db");

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let id = {
            let db = Database::new(Some(path.clone())).unwrap();
            db.create_session(start).unwrap()
        };

        let db = Database::new(Some(path)).unwrap();
        let session = db.get_session_by_id(id).unwrap().unwrap();
        assert_eq!(session.start_time, start);
    }
}
