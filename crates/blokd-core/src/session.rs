use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use blokd_storage::Database;

use crate::config::BREAKS_PER_SESSION;

/// Where the session state machine currently is.
///
/// Idle -> Monitoring on session start, Monitoring -> BreakActive when a
/// break is granted, BreakActive -> Monitoring on countdown expiry, and
/// back to Idle only on explicit stop or permission revocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Monitoring,
    BreakActive,
}

/// Shared runtime state for one monitoring session.
///
/// Counters are plain atomics: the monitoring loop and the IPC handler
/// read them concurrently, and each field has a single writer. The break
/// countdown task alone clears `break_active`; the loop only reads it.
pub struct SessionState {
    monitoring: AtomicBool,
    break_active: Arc<AtomicBool>,
    breaks_remaining: AtomicU32,
    blocked_attempts: AtomicU32,
    session_start: Mutex<DateTime<Utc>>,
    break_timer: Mutex<Option<JoinHandle<()>>>,
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            monitoring: AtomicBool::new(false),
            break_active: Arc::new(AtomicBool::new(false)),
            breaks_remaining: AtomicU32::new(BREAKS_PER_SESSION),
            blocked_attempts: AtomicU32::new(0),
            session_start: Mutex::new(Utc::now()),
            break_timer: Mutex::new(None),
        }
    }

    /// Transition Idle -> Monitoring, resetting the per-session counters.
    ///
    /// Returns `false` when a session is already active; starting twice is
    /// a no-op.
    pub fn begin_session(&self) -> bool {
        if self.monitoring.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.break_active.store(false, Ordering::SeqCst);
        self.breaks_remaining
            .store(BREAKS_PER_SESSION, Ordering::SeqCst);
        self.blocked_attempts.store(0, Ordering::SeqCst);
        if let Ok(mut start) = self.session_start.lock() {
            *start = Utc::now();
        }
        true
    }

    /// Transition to Idle from either Monitoring or BreakActive.
    ///
    /// Aborts an outstanding break countdown so no timer outlives the
    /// session.
    pub fn end_session(&self) {
        self.monitoring.store(false, Ordering::SeqCst);
        self.break_active.store(false, Ordering::SeqCst);
        if let Ok(mut timer) = self.break_timer.lock() {
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }
    }

    /// Grant a break, Monitoring -> BreakActive.
    ///
    /// Refused when no session is active, a break is already running, or
    /// the per-session allowance is exhausted. On success the remaining
    /// count after the decrement is returned and a countdown task is
    /// spawned that returns the state to Monitoring after `duration`.
    pub fn begin_break(&self, duration: Duration) -> Option<u32> {
        if !self.monitoring.load(Ordering::SeqCst) {
            return None;
        }
        if self
            .break_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }

        // Floor at zero: once exhausted no further break is grantable.
        let decremented = self
            .breaks_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));

        let Ok(before) = decremented else {
            self.break_active.store(false, Ordering::SeqCst);
            return None;
        };

        let break_active = Arc::clone(&self.break_active);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            break_active.store(false, Ordering::SeqCst);
            log::info!("Break finished, blocking resumed");
        });

        if let Ok(mut timer) = self.break_timer.lock() {
            *timer = Some(handle);
        }

        Some(before - 1)
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        if !self.monitoring.load(Ordering::SeqCst) {
            SessionPhase::Idle
        } else if self.break_active.load(Ordering::SeqCst) {
            SessionPhase::BreakActive
        } else {
            SessionPhase::Monitoring
        }
    }

    #[must_use]
    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_break_active(&self) -> bool {
        self.break_active.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn breaks_remaining(&self) -> u32 {
        self.breaks_remaining.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn blocked_attempts(&self) -> u32 {
        self.blocked_attempts.load(Ordering::SeqCst)
    }

    /// Count one blocked-app access attempt, returning the new total.
    pub fn record_attempt(&self) -> u32 {
        self.blocked_attempts.fetch_add(1, Ordering::SeqCst) + 1
    }

    #[must_use]
    pub fn session_duration_seconds(&self) -> u64 {
        let start = self
            .session_start
            .lock()
            .map_or_else(|_| Utc::now(), |s| *s);
        let secs = Utc::now().signed_duration_since(start).num_seconds();
        u64::try_from(secs).unwrap_or(0)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Persists the session lifecycle into session history.
pub struct SessionManager {
    database: Arc<Database>,
}

impl SessionManager {
    #[must_use]
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    /// Create a new session history row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub fn create_session(&self) -> Result<i64> {
        let session_id = self.database.create_session(Utc::now())?;
        log::info!("Created new session: {session_id}");
        Ok(session_id)
    }

    /// Record one blocked-app access attempt against a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub fn record_attempt(&self, session_id: i64) -> Result<()> {
        self.database.increment_session_attempts(session_id)?;
        Ok(())
    }

    /// Finalize a session with the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub fn finalize_session(&self, session_id: i64) -> Result<()> {
        self.database.finalize_session(session_id, Utc::now())?;
        log::info!("Finalized session: {session_id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_session_resets_counters() {
        let state = SessionState::new();
        assert!(state.begin_session());
        state.record_attempt();
        state.record_attempt();
        state.end_session();

        assert!(state.begin_session());
        assert_eq!(state.blocked_attempts(), 0);
        assert_eq!(state.breaks_remaining(), BREAKS_PER_SESSION);
        assert_eq!(state.phase(), SessionPhase::Monitoring);
    }

    #[test]
    fn duplicate_begin_session_is_a_noop() {
        let state = SessionState::new();
        assert!(state.begin_session());
        assert!(!state.begin_session());
        assert!(state.is_monitoring());
    }

    #[tokio::test]
    async fn break_decrements_and_floors_at_zero() {
        let state = Arc::new(SessionState::new());
        state.begin_session();

        // Long duration so the countdown never fires during the test; we
        // end each break by hand to exercise the counter alone.
        let long = Duration::from_secs(600);
        assert_eq!(state.begin_break(long), Some(2));
        state.break_active.store(false, Ordering::SeqCst);
        assert_eq!(state.begin_break(long), Some(1));
        state.break_active.store(false, Ordering::SeqCst);
        assert_eq!(state.begin_break(long), Some(0));
        state.break_active.store(false, Ordering::SeqCst);

        assert_eq!(state.begin_break(long), None);
        assert_eq!(state.breaks_remaining(), 0);
        assert!(!state.is_break_active());
    }

    #[tokio::test]
    async fn break_refused_while_one_is_active() {
        let state = Arc::new(SessionState::new());
        state.begin_session();

        assert_eq!(state.begin_break(Duration::from_secs(600)), Some(2));
        assert_eq!(state.begin_break(Duration::from_secs(600)), None);
        // The refused request must not consume an extra break.
        assert_eq!(state.breaks_remaining(), 2);
    }

    #[tokio::test]
    async fn break_refused_when_idle() {
        let state = Arc::new(SessionState::new());
        assert_eq!(state.begin_break(Duration::from_secs(600)), None);
        assert_eq!(state.breaks_remaining(), BREAKS_PER_SESSION);
    }

    #[tokio::test]
    async fn break_expires_back_to_monitoring() {
        let state = Arc::new(SessionState::new());
        state.begin_session();

        state.begin_break(Duration::from_millis(20)).unwrap();
        assert_eq!(state.phase(), SessionPhase::BreakActive);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(state.phase(), SessionPhase::Monitoring);
    }

    #[tokio::test]
    async fn end_session_cancels_the_countdown() {
        let state = Arc::new(SessionState::new());
        state.begin_session();
        state.begin_break(Duration::from_secs(600)).unwrap();

        state.end_session();
        assert_eq!(state.phase(), SessionPhase::Idle);
        assert!(!state.is_break_active());
    }
}
