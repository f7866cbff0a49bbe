use anyhow::Result;
use rusqlite::params;

use super::Database;
use crate::models::BlockedApp;

impl Database {
    /// Insert a package into the block-list. Duplicate inserts are no-ops.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub fn insert_blocked_app(&self, app: &BlockedApp) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO blocked_apps (package) VALUES (?1)",
            params![app.package],
        )?;
        Ok(())
    }

    /// Bulk-insert packages into the block-list inside a single transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub fn insert_blocked_apps(&self, apps: &[BlockedApp]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for app in apps {
            tx.execute(
                "INSERT OR IGNORE INTO blocked_apps (package) VALUES (?1)",
                params![app.package],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Remove a package from the block-list.
    ///
    /// Returns `true` when a row was actually deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub fn delete_blocked_app(&self, package: &str) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM blocked_apps WHERE package = ?1",
            params![package],
        )?;
        Ok(deleted > 0)
    }

    /// Remove every package from the block-list.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub fn clear_blocked_apps(&self) -> Result<usize> {
        let deleted = self.conn.execute("DELETE FROM blocked_apps", [])?;
        Ok(deleted)
    }

    /// Read the entire block-list, sorted by package name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_blocked_apps(&self) -> Result<Vec<BlockedApp>> {
        let mut stmt = self
            .conn
            .prepare("SELECT package FROM blocked_apps ORDER BY package")?;

        let apps = stmt
            .query_map([], |row| {
                Ok(BlockedApp {
                    package: row.get(0)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(apps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::in_memory().unwrap()
    }

    #[test]
    fn insert_is_idempotent() {
        let db = test_db();
        let app = BlockedApp::new("com.example.game");
        db.insert_blocked_app(&app).unwrap();
        db.insert_blocked_app(&app).unwrap();

        let apps = db.get_blocked_apps().unwrap();
        assert_eq!(apps, vec![app]);
    }

    #[test]
    fn bulk_insert_round_trips() {
        let db = test_db();
        let apps = vec![
            BlockedApp::new("com.example.game"),
            BlockedApp::new("com.example.feed"),
        ];
        db.insert_blocked_apps(&apps).unwrap();

        let stored = db.get_blocked_apps().unwrap();
        // Sorted by package name on read-back.
        assert_eq!(
            stored,
            vec![
                BlockedApp::new("com.example.feed"),
                BlockedApp::new("com.example.game"),
            ]
        );
    }

    #[test]
    fn delete_reports_whether_a_row_existed() {
        let db = test_db();
        db.insert_blocked_app(&BlockedApp::new("com.example.game"))
            .unwrap();

        assert!(db.delete_blocked_app("com.example.game").unwrap());
        assert!(!db.delete_blocked_app("com.example.game").unwrap());
        assert!(db.get_blocked_apps().unwrap().is_empty());
    }

    #[test]
    fn clear_empties_the_set() {
        let db = test_db();
        db.insert_blocked_apps(&[
            BlockedApp::new("com.example.a"),
            BlockedApp::new("com.example.b"),
        ])
        .unwrap();

        assert_eq!(db.clear_blocked_apps().unwrap(), 2);
        assert!(db.get_blocked_apps().unwrap().is_empty());
    }
}
