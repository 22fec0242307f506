// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for shelling out to an external tool (default checkout's
//! `git`, a local `command` hook's literal command) through the Process
//! Supervisor, so every phase's child output reaches the job log the same
//! way ("phases' outputs are concatenated in phase order").

use std::path::Path;
use std::time::Duration;

use bk_core::{Environment, ProcessExit, SignalReason};
use bk_supervisor::{StartSpec, Supervisor};
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;

/// Run a command, forwarding each chunk of its merged stdout/stderr to
/// `on_output` as it arrives, and return its structured exit.
pub(crate) async fn run_streamed(
    command: &str,
    args: &[String],
    cwd: &Path,
    env: &Environment,
    on_output: &mut dyn FnMut(&[u8]),
) -> Result<ProcessExit, PipelineError> {
    let spec = StartSpec {
        command: command.to_string(),
        args: args.to_vec(),
        env: env.clone(),
        cwd: cwd.to_path_buf(),
        pty: false,
    };
    let mut handle = Supervisor::start(spec).await?;
    while let Some(chunk) = handle.output.next_chunk().await {
        on_output(&chunk);
    }
    Ok(handle.wait_status().await?)
}

/// Like [`run_streamed`], but races the child's output against `cancel`.
/// Once `cancel` fires, the live child is handed the cancellation contract
/// (Interrupt, wait up to `grace_period`, then Terminate) instead of being
/// left to run to completion.
pub(crate) async fn run_streamed_cancellable(
    command: &str,
    args: &[String],
    cwd: &Path,
    env: &Environment,
    cancel: &CancellationToken,
    grace_period: Duration,
    on_output: &mut dyn FnMut(&[u8]),
) -> Result<ProcessExit, PipelineError> {
    let spec = StartSpec {
        command: command.to_string(),
        args: args.to_vec(),
        env: env.clone(),
        cwd: cwd.to_path_buf(),
        pty: false,
    };
    let mut handle = Supervisor::start(spec).await?;
    loop {
        tokio::select! {
            chunk = handle.output.next_chunk() => match chunk {
                Some(chunk) => on_output(&chunk),
                None => break,
            },
            _ = cancel.cancelled() => {
                let exit = handle.cancel(grace_period).await?;
                return Ok(exit.with_reason(SignalReason::Cancel));
            }
        }
    }
    Ok(handle.wait_status().await?)
}

/// Run a quiet informational command (e.g. `git rev-parse HEAD`) and
/// capture its stdout as text rather than forwarding it to the job log.
pub(crate) async fn run_captured(
    command: &str,
    args: &[String],
    cwd: &Path,
    env: &Environment,
) -> Result<(ProcessExit, String), PipelineError> {
    let mut captured = Vec::new();
    let exit = run_streamed(command, args, cwd, env, &mut |chunk| captured.extend_from_slice(chunk)).await?;
    Ok((exit, String::from_utf8_lossy(&captured).trim().to_string()))
}

pub(crate) async fn run_git(
    args: &[&str],
    cwd: &Path,
    env: &Environment,
    on_output: &mut dyn FnMut(&[u8]),
) -> Result<(), PipelineError> {
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    let exit = run_streamed("git", &args, cwd, env, on_output).await?;
    if !exit.is_success() {
        return Err(PipelineError::GitFailed { command: format!("git {}", args.join(" ")), exit_status: exit.status });
    }
    Ok(())
}
