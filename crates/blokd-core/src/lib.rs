pub mod blocklist;
pub mod config;
pub mod daemon;
pub mod daemon_control;
pub mod interstitial;
pub mod ipc;
pub mod monitor;
pub mod session;

pub use blocklist::BlockList;
pub use daemon::Daemon;
pub use session::{SessionPhase, SessionState};
