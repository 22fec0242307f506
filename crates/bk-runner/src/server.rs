// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The runner's accept loop, per-connection RPC handler, startup check, and
//! 100ms liveness scanner.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bk_core::{Environment, ProcessExit, SystemClock};
use tokio::net::{UnixListener, UnixStream};
use tracing::{info, warn};

use crate::error::RunnerError;
use crate::state::RunnerState;
use crate::wire::{read_frame, write_frame, RpcRequest, RpcResponse};

const LIVENESS_SCAN_INTERVAL: Duration = Duration::from_millis(100);

/// A cheaply-cloneable reference the Job Runner uses to interrupt every
/// connected client (all `Status` polls start returning `Interrupt`).
#[derive(Clone)]
pub struct RunnerHandle {
    state: Arc<RunnerState<SystemClock>>,
    stopped: Arc<AtomicBool>,
}

impl RunnerHandle {
    pub fn interrupt(&self) {
        self.state.set_interrupted();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

pub struct RunnerConfig {
    pub socket_path: PathBuf,
    pub client_count: u32,
    pub env: Environment,
    pub startup_timeout: Duration,
    pub liveness_threshold: Duration,
}

/// Runs the Unix-domain RPC service described for the multi-container
/// runner until every client has exited, a client is lost, or the startup
/// timeout elapses. `on_output` receives every `WriteLogs` payload in
/// arrival order across all clients.
pub async fn run(
    config: RunnerConfig,
    on_output: impl Fn(&[u8]) + Send + Sync + 'static,
) -> Result<(RunnerHandle, ProcessExit), RunnerError> {
    let listener = bind(&config.socket_path)?;
    let state = Arc::new(RunnerState::new(config.client_count, SystemClock));
    let stopped = Arc::new(AtomicBool::new(false));
    let handle = RunnerHandle { state: Arc::clone(&state), stopped: Arc::clone(&stopped) };
    let on_output = Arc::new(on_output);

    let (exit_tx, mut exit_rx) = tokio::sync::mpsc::channel::<i32>(1);
    let env = Arc::new(config.env);

    let accept_state = Arc::clone(&state);
    let accept_env = Arc::clone(&env);
    let accept_output = Arc::clone(&on_output);
    let accept_exit_tx = exit_tx.clone();
    let accept_task = tokio::spawn(async move {
        loop {
            let (stream, _addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!(error = %err, "runner accept failed");
                    continue;
                }
            };
            let state = Arc::clone(&accept_state);
            let env = Arc::clone(&accept_env);
            let output = Arc::clone(&accept_output);
            let exit_tx = accept_exit_tx.clone();
            tokio::spawn(async move {
                handle_connection(stream, state, env, output, exit_tx).await;
            });
        }
    });

    let startup_deadline = tokio::time::sleep(config.startup_timeout);
    tokio::pin!(startup_deadline);
    loop {
        if state.registered_count() >= config.client_count {
            break;
        }
        tokio::select! {
            _ = &mut startup_deadline => {
                accept_task.abort();
                return Err(RunnerError::StartupTimeout {
                    expected: config.client_count,
                    registered: state.registered_count(),
                });
            }
            _ = tokio::time::sleep(Duration::from_millis(10)) => {}
        }
    }
    info!(clients = config.client_count, "all clients registered, runner proceeding");

    let liveness_state = Arc::clone(&state);
    let liveness_threshold = config.liveness_threshold;
    let liveness_exit_tx = exit_tx.clone();
    let liveness_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(LIVENESS_SCAN_INTERVAL);
        loop {
            ticker.tick().await;
            let lost = liveness_state.scan_liveness(liveness_threshold);
            if !lost.is_empty() {
                warn!(?lost, "client(s) marked lost by liveness scan, terminating runner");
                let _ = liveness_exit_tx.send(lost_exit_status()).await;
                break;
            }
        }
    });

    let overall_status = exit_rx.recv().await.unwrap_or(1);
    accept_task.abort();
    liveness_task.abort();
    stopped.store(true, Ordering::SeqCst);

    Ok((handle, ProcessExit::from_status(overall_status)))
}

/// A status code outside 0..255 flags a liveness-driven termination for
/// diagnostics, distinguishing it from an ordinary client exit code.
fn lost_exit_status() -> i32 {
    300
}

fn bind(socket_path: &Path) -> Result<UnixListener, RunnerError> {
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let listener = UnixListener::bind(socket_path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o777))?;
    }
    Ok(listener)
}

async fn handle_connection(
    mut stream: UnixStream,
    state: Arc<RunnerState<SystemClock>>,
    env: Arc<Environment>,
    on_output: Arc<dyn Fn(&[u8]) + Send + Sync>,
    exit_tx: tokio::sync::mpsc::Sender<i32>,
) {
    loop {
        let request = match read_frame(&mut stream).await {
            Ok(Some(request)) => request,
            Ok(None) => return,
            Err(err) => {
                warn!(error = %err, "malformed frame on runner connection, closing");
                return;
            }
        };

        let response = match request {
            RpcRequest::Register { id } => match state.register(id) {
                Ok(()) => RpcResponse::Registered { env: env.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect() },
                Err(message) => RpcResponse::Error { message: message.to_string() },
            },
            RpcRequest::WriteLogs { bytes, .. } => {
                state.note_log_write();
                on_output(&bytes);
                RpcResponse::Ack
            }
            RpcRequest::Status { id } => RpcResponse::Status { state: state.status(id) },
            RpcRequest::Exit { id, status } => match state.exit(id, ProcessExit::from_status(status)) {
                Ok(Some(overall)) => {
                    let _ = exit_tx.send(overall).await;
                    RpcResponse::Ack
                }
                Ok(None) => RpcResponse::Ack,
                Err(message) => RpcResponse::Error { message: message.to_string() },
            },
        };

        if write_frame(&mut stream, &response).await.is_err() {
            return;
        }
    }
}
