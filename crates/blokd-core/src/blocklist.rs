use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;

use blokd_storage::{BlockedApp, Database};

/// Durable block-list with a live-updating read stream.
///
/// Every mutation goes straight to the database and then re-broadcasts
/// the full set on a watch channel, so subscribers always observe the
/// current, persisted state.
pub struct BlockList {
    database: Arc<Database>,
    tx: watch::Sender<HashSet<String>>,
}

impl BlockList {
    /// Open the block-list over an existing database handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial read fails
    pub fn new(database: Arc<Database>) -> Result<Self> {
        let initial = Self::read_set(&database)?;
        let (tx, _) = watch::channel(initial);
        Ok(Self { database, tx })
    }

    /// Add a package. Adding an already-blocked package is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub fn add(&self, package: &str) -> Result<()> {
        self.database
            .insert_blocked_app(&BlockedApp::new(package))?;
        self.broadcast()
    }

    /// Bulk-add packages in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub fn add_all(&self, packages: &[String]) -> Result<()> {
        let apps: Vec<BlockedApp> = packages.iter().map(BlockedApp::new).collect();
        self.database.insert_blocked_apps(&apps)?;
        self.broadcast()
    }

    /// Remove a package, reporting whether it was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub fn remove(&self, package: &str) -> Result<bool> {
        let removed = self.database.delete_blocked_app(package)?;
        self.broadcast()?;
        Ok(removed)
    }

    /// Remove every package, returning how many were dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub fn clear(&self) -> Result<usize> {
        let cleared = self.database.clear_blocked_apps()?;
        self.broadcast()?;
        Ok(cleared)
    }

    /// Current set of blocked packages.
    #[must_use]
    pub fn snapshot(&self) -> HashSet<String> {
        self.tx.borrow().clone()
    }

    /// Subscribe to the live stream of block-list states.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<HashSet<String>> {
        self.tx.subscribe()
    }

    fn broadcast(&self) -> Result<()> {
        let set = Self::read_set(&self.database)?;
        self.tx.send_replace(set);
        Ok(())
    }

    fn read_set(database: &Database) -> Result<HashSet<String>> {
        Ok(database
            .get_blocked_apps()?
            .into_iter()
            .map(|app| app.package)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_list() -> BlockList {
        BlockList::new(Arc::new(Database::in_memory().unwrap())).unwrap()
    }

    #[test]
    fn add_remove_clear_round_trip() {
        let list = block_list();

        list.add("com.example.game").unwrap();
        list.add("com.example.game").unwrap();
        list.add("com.example.feed").unwrap();
        assert_eq!(list.snapshot().len(), 2);

        assert!(list.remove("com.example.feed").unwrap());
        assert!(!list.remove("com.example.feed").unwrap());
        assert_eq!(
            list.snapshot(),
            HashSet::from(["com.example.game".to_string()])
        );

        assert_eq!(list.clear().unwrap(), 1);
        assert!(list.snapshot().is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_mutations() {
        let list = block_list();
        let mut rx = list.subscribe();

        list.add("com.example.game").unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow().contains("com.example.game"));
    }
}
