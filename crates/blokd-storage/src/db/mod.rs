//! Database operations split into domain-specific modules.
//!
//! This module re-exports the main Database struct and all its operations.

mod blocked_apps;
mod helpers;
mod sessions;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::PathBuf;

use crate::migrations;

/// Database connection wrapper
pub struct Database {
    pub(crate) conn: Connection,
}

// Implement Send and Sync for Database to allow sharing across threads
unsafe impl Send for Database {}
unsafe impl Sync for Database {}

impl Database {
    /// Create a new database connection
    ///
    /// # Errors
    ///
    /// Returns an error if database directory creation, connection opening,
    /// or schema initialization fails
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = db_path.unwrap_or_else(Self::default_db_path);

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(&path).context("Failed to open database connection")?;

        migrations::init_schema(&conn)?;

        log::info!("Database initialized at: {}", path.display());

        Ok(Self { conn })
    }

    /// Open an in-memory database, used by tests and dry runs
    ///
    /// # Errors
    ///
    /// Returns an error if connection opening or schema initialization fails
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        migrations::init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get default database path
    fn default_db_path() -> PathBuf {
        let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("blokd");
        path.push("blokd.db");
        path
    }
}
