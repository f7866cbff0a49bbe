/// Daemon lifecycle management commands
use anyhow::Result;
use std::{env, fs, path::Path, process::Command, thread::sleep, time};
use sysinfo::{Pid, System};

use blokd_core::{
    config::get_data_dir,
    daemon_control::DaemonControl,
    interstitial::create_interstitial,
    ipc::{IpcClient, IpcRequest, IpcResponse},
    monitor::create_monitor,
    Daemon,
};
use blokd_storage::Database;

pub fn start_daemon(data_dir: &Path) -> Result<()> {
    fs::create_dir_all(data_dir)?;
    let control = DaemonControl::new(data_dir);

    // Starting while a daemon is already running is a no-op.
    if let Some(pid) = control.get_pid().unwrap_or(None) {
        let mut sys = System::new();
        if sys.refresh_process(Pid::from(pid as usize)) {
            log::info!("Daemon is already running (PID: {pid}).");
            return Ok(());
        }
        log::warn!("Removing stale PID file.");
        control.remove_pid()?;
    }

    if control.sock_path().exists() {
        log::warn!("Removing stale socket file.");
        control.remove_sock()?;
    }

    log::info!("Starting blokd daemon...");

    let current_exe = env::current_exe()?;
    let current_dir = env::current_dir()?;
    let child = Command::new(current_exe)
        .arg("daemon-internal-start")
        .current_dir(current_dir)
        .spawn()?;

    log::info!("Daemon process started with PID: {}", child.id());
    control.write_pid(child.id())?;

    Ok(())
}

pub async fn run_daemon_process() -> Result<()> {
    // This is the detached daemon process; it needs its own logging setup.
    if let Err(e) = setup_daemon_logging() {
        // If logging fails, we have no way to report errors. Panicking is the only option.
        panic!("Failed to set up daemon logging: {e}");
    }
    log::info!("Daemon process started internally.");

    if let Err(e) = daemon_main_logic().await {
        log::error!("Daemon main logic exited with a fatal error: {e:#}");
        return Err(e);
    }

    Ok(())
}

async fn daemon_main_logic() -> Result<()> {
    let database = std::sync::Arc::new(Database::new(None)?);
    let monitor = create_monitor()?;
    let interstitial = create_interstitial()?;
    let mut daemon = Daemon::new(database, monitor, interstitial);
    daemon.run_with_signals().await
}

pub async fn stop_daemon(data_dir: &Path) -> Result<()> {
    let control = DaemonControl::new(data_dir);

    let Some(pid) = control.get_pid().unwrap_or(None) else {
        log::info!("Daemon is not running (no PID file).");
        control.remove_sock()?;
        return Ok(());
    };

    log::info!("Stopping blokd daemon (PID: {pid})...");
    let client = IpcClient::new(control.sock_path());

    match client.send_command(IpcRequest::Shutdown).await {
        Ok(IpcResponse::Shutdown) => {
            log::info!("Daemon shutdown signal sent. Waiting for process to exit...");
            sleep(time::Duration::from_secs(2));

            let mut sys = System::new();
            if sys.refresh_process(Pid::from(pid as usize)) {
                log::warn!("Daemon did not stop gracefully. Force killing...");
                if let Some(process) = sys.process(Pid::from(pid as usize)) {
                    process.kill();
                }
            } else {
                log::info!("Daemon stopped successfully.");
            }
        }
        Ok(resp) => log::error!("Received unexpected response from daemon: {resp:?}"),
        Err(e) => {
            log::error!("Failed to send shutdown command: {e}. Forcing cleanup.");
            let mut sys = System::new();
            if sys.refresh_process(Pid::from(pid as usize)) {
                if let Some(process) = sys.process(Pid::from(pid as usize)) {
                    process.kill();
                    log::info!("Process killed.");
                }
            }
        }
    }

    control.remove_pid()?;
    control.remove_sock()?;

    Ok(())
}

pub async fn show_status(data_dir: &Path) -> Result<()> {
    let control = DaemonControl::new(data_dir);

    if !control.sock_path().exists() {
        println!("Session Status: Not running");
        return Ok(());
    }

    let client = IpcClient::new(control.sock_path());
    match client.send_command(IpcRequest::Status).await {
        Ok(IpcResponse::Status {
            running,
            current_app,
            break_active,
            breaks_remaining,
            blocked_attempts,
            session_duration,
        }) => {
            println!(
                "Session Status: {}",
                if running { "Monitoring" } else { "Idle" }
            );
            println!(
                "Foreground App: {}",
                current_app.unwrap_or_else(|| "None".to_string())
            );
            if break_active {
                println!("Break: active (blocking suspended)");
            }
            println!("Breaks Remaining: {breaks_remaining}");
            println!("Blocked Attempts: {blocked_attempts}");

            let hours = session_duration / 3600;
            let minutes = (session_duration % 3600) / 60;
            let seconds = session_duration % 60;
            println!("Session Duration: {hours:02}:{minutes:02}:{seconds:02}");
        }
        Ok(_) => anyhow::bail!("Unexpected response from daemon"),
        Err(e) => {
            log::error!("Failed to get status: {e}");
            println!("Session Status: Not running (or not responding)");
        }
    }
    Ok(())
}

pub async fn request_break(data_dir: &Path) -> Result<()> {
    let control = DaemonControl::new(data_dir);

    if !control.sock_path().exists() {
        println!("No active session - start monitoring first.");
        return Ok(());
    }

    let client = IpcClient::new(control.sock_path());
    match client.send_command(IpcRequest::Break).await {
        Ok(IpcResponse::Break {
            granted,
            breaks_remaining,
        }) => {
            if granted {
                println!("Break started. Blocking is suspended; {breaks_remaining} break(s) left.");
            } else if breaks_remaining == 0 {
                println!("No breaks left this session.");
            } else {
                println!("Break refused - one is already running.");
            }
        }
        Ok(_) => anyhow::bail!("Unexpected response from daemon"),
        Err(e) => {
            log::error!("Failed to request break: {e}");
            println!("No active session - start monitoring first.");
        }
    }
    Ok(())
}

fn setup_daemon_logging() -> Result<()> {
    use std::fs::{create_dir_all, OpenOptions};

    let log_path = get_data_dir()?.join("blokd.log");

    if let Some(parent) = log_path.parent() {
        create_dir_all(parent)?;
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter_level(log::LevelFilter::Debug)
        .init();

    Ok(())
}
