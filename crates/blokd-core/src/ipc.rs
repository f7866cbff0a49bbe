use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{atomic::Ordering, Arc},
    time::Duration,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{UnixListener, UnixStream},
    sync::Mutex,
};

use crate::session::SessionState;

/// IPC request from CLI to daemon
#[derive(Serialize, Deserialize, Debug)]
pub enum IpcRequest {
    Status,
    Break,
    Shutdown,
}

/// IPC response from daemon to CLI
#[derive(Serialize, Deserialize, Debug)]
pub enum IpcResponse {
    Status {
        running: bool,
        current_app: Option<String>,
        break_active: bool,
        breaks_remaining: u32,
        blocked_attempts: u32,
        session_duration: u64,
    },
    Break {
        granted: bool,
        breaks_remaining: u32,
    },
    Shutdown,
}

#[derive(Debug)]
pub struct IpcClient {
    sock_path: PathBuf,
}

impl IpcClient {
    #[must_use]
    pub fn new(sock_path: &Path) -> Self {
        Self {
            sock_path: sock_path.to_path_buf(),
        }
    }

    /// Send one request and read the daemon's response.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is unreachable or the frame cannot
    /// be decoded
    pub async fn send_command(&self, request: IpcRequest) -> Result<IpcResponse> {
        let mut stream = UnixStream::connect(&self.sock_path).await?;

        let encoded = bincode::serialize(&request)?;
        stream.write_all(&encoded).await?;
        stream.shutdown().await?;

        let mut buffer = Vec::new();
        stream.read_to_end(&mut buffer).await?;
        let response: IpcResponse = bincode::deserialize(&buffer)?;

        Ok(response)
    }
}

pub struct DaemonIpcHandler {
    state: Arc<SessionState>,
    current_app: Mutex<Option<String>>,
    break_duration: Duration,
    shutdown_signal: Arc<std::sync::atomic::AtomicBool>,
}

impl DaemonIpcHandler {
    #[must_use]
    pub fn new(
        state: Arc<SessionState>,
        shutdown_signal: Arc<std::sync::atomic::AtomicBool>,
        break_duration: Duration,
    ) -> Self {
        Self {
            state,
            current_app: Mutex::new(None),
            break_duration,
            shutdown_signal,
        }
    }

    pub async fn set_current_app(&self, package: Option<String>) {
        let mut lock = self.current_app.lock().await;
        *lock = package;
    }

    async fn respond(&self, request: IpcRequest) -> IpcResponse {
        match request {
            IpcRequest::Status => {
                let current_app = self.current_app.lock().await.clone();
                IpcResponse::Status {
                    running: self.state.is_monitoring(),
                    current_app,
                    break_active: self.state.is_break_active(),
                    breaks_remaining: self.state.breaks_remaining(),
                    blocked_attempts: self.state.blocked_attempts(),
                    session_duration: self.state.session_duration_seconds(),
                }
            }
            IpcRequest::Break => {
                let granted = self.state.begin_break(self.break_duration);
                if let Some(remaining) = granted {
                    log::info!("Break started ({remaining} remaining)");
                }
                IpcResponse::Break {
                    granted: granted.is_some(),
                    breaks_remaining: self.state.breaks_remaining(),
                }
            }
            IpcRequest::Shutdown => {
                self.shutdown_signal.store(true, Ordering::SeqCst);
                IpcResponse::Shutdown
            }
        }
    }

    /// Handle one decoded request on an accepted connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the response cannot be written back
    pub async fn handle(&self, stream: &mut UnixStream, request: IpcRequest) -> Result<()> {
        let response = self.respond(request).await;
        let encoded = bincode::serialize(&response)?;
        stream.write_all(&encoded).await?;
        Ok(())
    }
}

/// Accept loop for the daemon's control socket.
///
/// # Errors
///
/// Returns an error if the socket cannot be bound
pub async fn listen(handler: Arc<DaemonIpcHandler>, sock_path: &Path) -> io::Result<()> {
    if sock_path.exists() {
        fs::remove_file(sock_path)?;
    }
    let listener = UnixListener::bind(sock_path)?;

    loop {
        match listener.accept().await {
            Ok((mut stream, _)) => {
                let handler = handler.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0; 1024];
                    match stream.read(&mut buf).await {
                        Ok(n) if n > 0 => match bincode::deserialize::<IpcRequest>(&buf[..n]) {
                            Ok(request) => {
                                if let Err(e) = handler.handle(&mut stream, request).await {
                                    log::error!("IPC handle error: {e}");
                                }
                            }
                            Err(e) => {
                                log::error!("IPC deserialize error: {e}");
                            }
                        },
                        Ok(_) => {} // Connection closed
                        Err(e) => {
                            log::error!("IPC read error: {e}");
                        }
                    }
                });
            }
            Err(e) => {
                log::error!("IPC accept error: {e}");
            }
        }
    }
}
