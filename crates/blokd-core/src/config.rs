use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

/// Package identifier of blokd itself. The monitoring loop never blocks
/// its own package, and the Android monitor probes permissions for it.
pub const SELF_PACKAGE: &str = "dev.blokd.app";

/// How often the monitoring loop samples the foreground application.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Fixed length of a user-requested break.
pub const BREAK_DURATION: Duration = Duration::from_secs(5 * 60);

/// Breaks granted at the start of every session.
pub const BREAKS_PER_SESSION: u32 = 3;

/// Trailing window of usage events considered when sampling the
/// foreground application.
pub const FOREGROUND_WINDOW: Duration = Duration::from_secs(10);

/// Get the local data directory for blokd.
///
/// # Errors
///
/// Returns an error if the local data directory cannot be determined.
pub fn get_data_dir() -> Result<PathBuf> {
    let mut path =
        dirs::data_local_dir().ok_or_else(|| anyhow::anyhow!("Failed to get local data dir"))?;
    path.push("blokd");
    Ok(path)
}
