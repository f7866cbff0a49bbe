use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Pid-file bookkeeping for the detached daemon process.
pub struct DaemonControl {
    pid_file: PathBuf,
    sock_file: PathBuf,
}

impl DaemonControl {
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            pid_file: data_dir.join("blokd.pid"),
            sock_file: data_dir.join("blokd.sock"),
        }
    }

    #[must_use]
    pub fn sock_path(&self) -> &Path {
        &self.sock_file
    }

    /// Read the recorded daemon PID, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the pid file exists but cannot be parsed
    pub fn get_pid(&self) -> Result<Option<u32>> {
        if !self.pid_file.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.pid_file)?;
        Ok(Some(contents.trim().parse::<u32>()?))
    }

    /// Record the daemon PID.
    ///
    /// # Errors
    ///
    /// Returns an error if the pid file cannot be written
    pub fn write_pid(&self, pid: u32) -> Result<()> {
        fs::write(&self.pid_file, pid.to_string())?;
        Ok(())
    }

    /// Remove the pid file, ignoring an already-missing file.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails
    pub fn remove_pid(&self) -> Result<()> {
        if self.pid_file.exists() {
            fs::remove_file(&self.pid_file)?;
        }
        Ok(())
    }

    /// Remove a stale control socket.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails
    pub fn remove_sock(&self) -> Result<()> {
        if self.sock_file.exists() {
            fs::remove_file(&self.sock_file)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let control = DaemonControl::new(dir.path());

        assert_eq!(control.get_pid().unwrap(), None);
        control.write_pid(4242).unwrap();
        assert_eq!(control.get_pid().unwrap(), Some(4242));
        control.remove_pid().unwrap();
        assert_eq!(control.get_pid().unwrap(), None);
        // Removing twice is fine.
        control.remove_pid().unwrap();
    }
}
