use anyhow::Result;
use std::{
    collections::HashSet,
    sync::{atomic::Ordering, Arc},
    time::Duration,
};
use tokio::time::interval;

use blokd_storage::Database;

use crate::{
    config::{self, BREAK_DURATION, POLL_INTERVAL, SELF_PACKAGE},
    interstitial::InterstitialLauncher,
    ipc::{listen, DaemonIpcHandler},
    monitor::ForegroundMonitor,
    session::{SessionManager, SessionState},
};

/// The monitoring loop: samples the foreground application once per poll
/// interval and launches the blocking interstitial when a blocked package
/// comes to the foreground.
pub struct Daemon {
    database: Arc<Database>,
    monitor: Box<dyn ForegroundMonitor>,
    interstitial: Box<dyn InterstitialLauncher>,
    sessions: SessionManager,
    state: Arc<SessionState>,
    ipc_handler: Arc<DaemonIpcHandler>,
    shutdown_signal: Arc<std::sync::atomic::AtomicBool>,
    blocked: HashSet<String>,
    last_foreground: Option<String>,
    current_session_id: Option<i64>,
    self_package: String,
    poll_interval: Duration,
}

impl Daemon {
    /// Build a daemon over the platform capabilities.
    ///
    /// The block-list snapshot is loaded once, at session start, inside
    /// [`Self::run_with_signals`].
    #[must_use]
    pub fn new(
        database: Arc<Database>,
        monitor: Box<dyn ForegroundMonitor>,
        interstitial: Box<dyn InterstitialLauncher>,
    ) -> Self {
        let state = Arc::new(SessionState::new());
        let shutdown_signal = Arc::new(std::sync::atomic::AtomicBool::new(false));

        Self {
            sessions: SessionManager::new(Arc::clone(&database)),
            database,
            monitor,
            interstitial,
            ipc_handler: Arc::new(DaemonIpcHandler::new(
                Arc::clone(&state),
                Arc::clone(&shutdown_signal),
                BREAK_DURATION,
            )),
            state,
            shutdown_signal,
            blocked: HashSet::new(),
            last_foreground: None,
            current_session_id: None,
            self_package: SELF_PACKAGE.to_string(),
            poll_interval: POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Shared runtime state, exposed for the UI/IPC layer.
    #[must_use]
    pub fn state(&self) -> Arc<SessionState> {
        Arc::clone(&self.state)
    }

    /// Run the monitoring session until stop or permission revocation.
    ///
    /// Starting while a session is already active is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be recorded or the block-list
    /// snapshot cannot be read
    pub async fn run_with_signals(&mut self) -> Result<()> {
        if !self.state.begin_session() {
            log::warn!("Monitoring already active, ignoring duplicate start");
            return Ok(());
        }

        self.begin()?;

        let sock_path = config::get_data_dir()?.join("blokd.sock");
        let ipc_handler = Arc::clone(&self.ipc_handler);
        let ipc_task = tokio::spawn(async move {
            if let Err(e) = listen(ipc_handler, &sock_path).await {
                log::error!("IPC listener failed: {e}");
            }
        });

        let mut interval = interval(self.poll_interval);
        log::info!("Monitoring started ({} blocked apps)", self.blocked.len());

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        log::error!("Monitor tick failed: {e}");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Received Ctrl-C, shutting down...");
                    self.shutdown_signal.store(true, Ordering::SeqCst);
                }
            }

            if self.shutdown_signal.load(Ordering::SeqCst) {
                break;
            }
        }

        ipc_task.abort();
        self.finalize()?;
        log::info!("Monitoring stopped.");
        Ok(())
    }

    /// Load the block-list snapshot and open the session history row.
    fn begin(&mut self) -> Result<()> {
        self.blocked = self
            .database
            .get_blocked_apps()?
            .into_iter()
            .map(|app| app.package)
            .collect();
        log::debug!("Loaded blocked apps: {:?}", self.blocked);

        self.last_foreground = None;
        self.current_session_id = Some(self.sessions.create_session()?);
        Ok(())
    }

    /// End the session: state back to Idle, history row finalized, break
    /// countdown cancelled.
    fn finalize(&mut self) -> Result<()> {
        self.state.end_session();
        if let Some(session_id) = self.current_session_id.take() {
            self.sessions.finalize_session(session_id)?;
            log::info!(
                "Session {session_id} ended with {} blocked attempts",
                self.state.blocked_attempts()
            );
        }
        Ok(())
    }

    /// One poll: permission check, foreground sample, block decision.
    async fn tick(&mut self) -> Result<()> {
        // Permission revocation is fatal to the session - no retry.
        let permitted = self.monitor.permissions_granted().await.unwrap_or(false);
        if !permitted {
            log::error!("Permissions revoked. Stopping session.");
            self.shutdown_signal.store(true, Ordering::SeqCst);
            return Ok(());
        }

        if self.state.is_break_active() {
            return Ok(());
        }

        let foreground = self.monitor.current_app().await?;
        log::debug!("Current app: {foreground:?}");

        self.ipc_handler.set_current_app(foreground.clone()).await;

        // Edge-triggered: fire once per transition into a blocked app, not
        // on every tick the app stays in the foreground.
        let changed = foreground != self.last_foreground;
        if changed {
            if let Some(package) = &foreground {
                if self.is_blocked(package) {
                    self.on_blocked(package).await;
                }
            }
        }
        self.last_foreground = foreground;

        Ok(())
    }

    fn is_blocked(&self, package: &str) -> bool {
        package != self.self_package && self.blocked.contains(package)
    }

    async fn on_blocked(&self, package: &str) {
        log::info!("Blocked app detected: {package}");

        if let Err(e) = self.interstitial.show(package).await {
            log::warn!("Failed to launch blocking screen: {e}");
        }

        let attempts = self.state.record_attempt();
        log::debug!("Blocked attempts this session: {attempts}");

        if let Some(session_id) = self.current_session_id {
            if let Err(e) = self.sessions.record_attempt(session_id) {
                log::warn!("Failed to persist attempt count: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interstitial::RecordingInterstitial;
    use crate::monitor::scripted::ScriptedMonitor;
    use crate::session::SessionPhase;

    struct Harness {
        daemon: Daemon,
        database: Arc<Database>,
        monitor: Arc<ScriptedMonitor>,
        interstitial: Arc<RecordingInterstitial>,
    }

    fn harness<S, I>(blocked: &[&str], script: I) -> Harness
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        let database = Arc::new(Database::in_memory().unwrap());
        for package in blocked {
            database
                .insert_blocked_app(&blokd_storage::BlockedApp::new(*package))
                .unwrap();
        }

        let monitor = Arc::new(ScriptedMonitor::new(script));
        let interstitial = Arc::new(RecordingInterstitial::default());
        let daemon = Daemon::new(
            Arc::clone(&database),
            Box::new(Arc::clone(&monitor)),
            Box::new(Arc::clone(&interstitial)),
        )
        .with_poll_interval(Duration::from_millis(5));

        Harness {
            daemon,
            database,
            monitor,
            interstitial,
        }
    }

    /// Start the session and run `ticks` polls without the outer loop.
    async fn run_ticks(h: &mut Harness, ticks: usize) {
        assert!(h.daemon.state.begin_session());
        h.daemon.begin().unwrap();
        for _ in 0..ticks {
            h.daemon.tick().await.unwrap();
        }
    }

    #[tokio::test]
    async fn blocks_exactly_once_per_foreground_transition() {
        let mut h = harness(
            &["com.example.game"],
            [Some("com.example.game"), Some("com.example.game")],
        );
        run_ticks(&mut h, 3).await;

        assert_eq!(h.interstitial.shown(), vec!["com.example.game"]);
        assert_eq!(h.daemon.state.blocked_attempts(), 1);

        let session = h.database.get_sessions().unwrap().remove(0);
        assert_eq!(session.blocked_attempts, 1);
    }

    #[tokio::test]
    async fn re_entering_a_blocked_app_fires_again() {
        let mut h = harness(
            &["com.example.game"],
            [
                Some("com.example.game"),
                Some("com.example.launcher"),
                Some("com.example.game"),
            ],
        );
        run_ticks(&mut h, 3).await;

        assert_eq!(
            h.interstitial.shown(),
            vec!["com.example.game", "com.example.game"]
        );
        assert_eq!(h.daemon.state.blocked_attempts(), 2);
    }

    #[tokio::test]
    async fn unblocked_and_own_packages_pass_through() {
        let mut h = harness(
            &[SELF_PACKAGE, "com.example.game"],
            [Some("com.example.launcher"), Some(SELF_PACKAGE)],
        );
        run_ticks(&mut h, 2).await;

        assert!(h.interstitial.shown().is_empty());
        assert_eq!(h.daemon.state.blocked_attempts(), 0);
    }

    #[tokio::test]
    async fn no_foreground_app_is_not_an_error() {
        let mut h = harness(&["com.example.game"], [Option::<String>::None]);
        run_ticks(&mut h, 2).await;

        assert!(h.interstitial.shown().is_empty());
        assert!(h.daemon.state.is_monitoring());
    }

    #[tokio::test]
    async fn break_suspends_blocking_until_expiry() {
        let mut h = harness(
            &["com.example.game"],
            [
                Some("com.example.launcher"),
                Some("com.example.game"),
                Some("com.example.game"),
            ],
        );
        assert!(h.daemon.state.begin_session());
        h.daemon.begin().unwrap();
        h.daemon.tick().await.unwrap();

        let state = h.daemon.state();
        assert_eq!(state.begin_break(Duration::from_millis(30)), Some(2));
        assert_eq!(state.phase(), SessionPhase::BreakActive);

        // The blocked app comes to the foreground mid-break: nothing fires.
        h.daemon.tick().await.unwrap();
        assert!(h.interstitial.shown().is_empty());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(state.phase(), SessionPhase::Monitoring);

        // After expiry the next sample sees the transition and blocks.
        h.daemon.tick().await.unwrap();
        assert_eq!(h.interstitial.shown(), vec!["com.example.game"]);
    }

    #[tokio::test]
    async fn permission_revocation_is_fatal() {
        let mut h = harness(&["com.example.game"], [Some("com.example.launcher")]);
        run_ticks(&mut h, 1).await;
        assert!(!h.daemon.shutdown_signal.load(Ordering::SeqCst));

        h.monitor.revoke_permissions();
        h.daemon.tick().await.unwrap();
        assert!(h.daemon.shutdown_signal.load(Ordering::SeqCst));

        h.daemon.finalize().unwrap();
        assert_eq!(h.daemon.state.phase(), SessionPhase::Idle);
        let session = h.database.get_sessions().unwrap().remove(0);
        assert!(session.end_time.is_some());
    }

    #[tokio::test]
    async fn finalize_writes_the_session_row() {
        let mut h = harness(&["com.example.game"], [Some("com.example.game")]);
        run_ticks(&mut h, 1).await;
        h.daemon.finalize().unwrap();

        let sessions = h.database.get_sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].blocked_attempts, 1);
        assert!(sessions[0].end_time.is_some());
    }
}
