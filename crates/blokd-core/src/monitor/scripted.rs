use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::ForegroundMonitor;

/// Test double replaying a scripted sequence of foreground apps.
///
/// Each `current_app` call consumes one entry; once the script runs out
/// the final entry is held, so a loop can keep ticking on a stable
/// foreground state. Permissions can be revoked mid-script to exercise
/// the fatal-stop path.
pub struct ScriptedMonitor {
    script: Mutex<VecDeque<Option<String>>>,
    held: Mutex<Option<String>>,
    permitted: AtomicBool,
}

impl ScriptedMonitor {
    #[must_use]
    pub fn new<I, S>(sequence: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(
                sequence
                    .into_iter()
                    .map(|app| app.map(Into::into))
                    .collect(),
            ),
            held: Mutex::new(None),
            permitted: AtomicBool::new(true),
        }
    }

    pub fn revoke_permissions(&self) {
        self.permitted.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl ForegroundMonitor for ScriptedMonitor {
    async fn current_app(&self) -> Result<Option<String>> {
        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front());

        let mut held = self
            .held
            .lock()
            .map_err(|_| anyhow::anyhow!("scripted monitor poisoned"))?;

        if let Some(app) = next {
            *held = app;
        }
        Ok(held.clone())
    }

    async fn permissions_granted(&self) -> Result<bool> {
        Ok(self.permitted.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_script_then_holds_last_entry() {
        let monitor = ScriptedMonitor::new([
            Some("com.example.game"),
            None,
            Some("com.example.feed"),
        ]);

        assert_eq!(
            monitor.current_app().await.unwrap(),
            Some("com.example.game".to_string())
        );
        assert_eq!(monitor.current_app().await.unwrap(), None);
        assert_eq!(
            monitor.current_app().await.unwrap(),
            Some("com.example.feed".to_string())
        );
        // Exhausted: holds the final state.
        assert_eq!(
            monitor.current_app().await.unwrap(),
            Some("com.example.feed".to_string())
        );
    }

    #[tokio::test]
    async fn permissions_can_be_revoked() {
        let monitor = ScriptedMonitor::new([Some("com.example.game")]);
        assert!(monitor.permissions_granted().await.unwrap());
        monitor.revoke_permissions();
        assert!(!monitor.permissions_granted().await.unwrap());
    }
}
