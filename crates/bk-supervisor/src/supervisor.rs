// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Process Supervisor: launches a command, exposes its
//! merged output, and reports a structured exit status.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use bk_core::{Environment, ProcessExit};
use nix::sys::signal::Signal;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::SupervisorError;
use crate::kill_guard::KillGuard;
use crate::output::OutputStream;
use crate::process_group::{configure_new_group, signal_group};

#[cfg(unix)]
use crate::pty::Pty;

/// Parameters for `Supervisor::start`.
pub struct StartSpec {
    pub command: String,
    pub args: Vec<String>,
    pub env: Environment,
    pub cwd: PathBuf,
    /// Attach the child to a pseudo-terminal instead of pipes. Ignored
    /// (treated as `false`) on non-Unix targets.
    pub pty: bool,
}

/// A running or finished subprocess ( `ProcessHandle`).
pub struct ProcessHandle {
    killer: KillGuard,
    pgid: i32,
    pub output: OutputStream,
    exited: bool,
}

impl ProcessHandle {
    pub fn pid(&mut self) -> Option<u32> {
        self.killer.as_mut().id()
    }

    /// Send the configured soft signal to the whole process group.
    pub fn interrupt(&self) -> Result<(), SupervisorError> {
        debug!(pgid = self.pgid, "interrupting process group");
        signal_group(self.pgid, Signal::SIGTERM).map_err(Into::into)
    }

    /// Send SIGKILL to the whole process group.
    pub fn terminate(&self) -> Result<(), SupervisorError> {
        warn!(pgid = self.pgid, "terminating process group");
        signal_group(self.pgid, Signal::SIGKILL).map_err(Into::into)
    }

    /// Block until the child has exited and return its structured status.
    pub async fn wait_status(&mut self) -> Result<ProcessExit, SupervisorError> {
        if self.exited {
            return Err(SupervisorError::AlreadyExited);
        }
        let status = self.killer.as_mut().wait().await?;
        self.killer.disarm();
        self.exited = true;
        Ok(exit_status_to_process_exit(status))
    }

    /// The cancellation contract: Interrupt, wait up to
    /// `grace_period`, then Terminate if the child is still alive.
    pub async fn cancel(&mut self, grace_period: Duration) -> Result<ProcessExit, SupervisorError> {
        self.interrupt()?;
        match tokio::time::timeout(grace_period, self.wait_status()).await {
            Ok(result) => result,
            Err(_elapsed) => {
                self.output.abort();
                self.terminate()?;
                self.wait_status().await
            }
        }
    }
}

fn exit_status_to_process_exit(status: std::process::ExitStatus) -> ProcessExit {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            let name = Signal::try_from(signal)
                .map(|s| s.as_str().to_string())
                .unwrap_or_else(|_| format!("SIG{signal}"));
            return ProcessExit { status: 128 + signal, signal: Some(name), reason: None };
        }
    }
    ProcessExit::from_status(status.code().unwrap_or(1))
}

pub struct Supervisor;

impl Supervisor {
    /// Launch `spec.command` as described On POSIX the
    /// child is placed in its own process group unless a PTY is requested,
    /// in which case the PTY session supplies the group implicitly.
    pub async fn start(spec: StartSpec) -> Result<ProcessHandle, SupervisorError> {
        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args).current_dir(&spec.cwd).kill_on_drop(true);
        cmd.env_clear();
        for (key, value) in spec.env.iter() {
            cmd.env(key, value);
        }

        #[cfg(unix)]
        let pty_reader = if spec.pty {
            let (pty, [stdin, stdout, stderr]) = Pty::open()?;
            cmd.stdin(stdin).stdout(stdout).stderr(stderr);
            Some(pty)
        } else {
            configure_new_group(&mut cmd);
            cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
            None
        };
        #[cfg(not(unix))]
        {
            cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        let mut child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
            command: spec.command.clone(),
            source,
        })?;
        let pid = child.id().ok_or(SupervisorError::NotStarted)?;
        info!(command = %spec.command, pid, pty = spec.pty, "process started");

        #[cfg(unix)]
        let output = if let Some(pty) = pty_reader {
            let (tx, rx) = tokio::sync::mpsc::channel(64);
            pty.spawn_reader(tx);
            OutputStream::from_receiver(rx)
        } else {
            let stdout = child.stdout.take().ok_or(SupervisorError::NotStarted)?;
            let stderr = child.stderr.take().ok_or(SupervisorError::NotStarted)?;
            OutputStream::spawn(stdout, stderr)
        };
        #[cfg(not(unix))]
        let output = {
            let stdout = child.stdout.take().ok_or(SupervisorError::NotStarted)?;
            let stderr = child.stderr.take().ok_or(SupervisorError::NotStarted)?;
            OutputStream::spawn(stdout, stderr)
        };

        Ok(ProcessHandle {
            killer: KillGuard::new(child),
            pgid: pid as i32,
            output,
            exited: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bk_core::Environment;

    #[tokio::test]
    async fn true_exits_zero() {
        let spec = StartSpec {
            command: "true".into(),
            args: vec![],
            env: Environment::new(),
            cwd: std::env::temp_dir(),
            pty: false,
        };
        let mut handle = Supervisor::start(spec).await.unwrap();
        let exit = handle.wait_status().await.unwrap();
        assert!(exit.is_success());
    }

    #[tokio::test]
    async fn false_exits_nonzero() {
        let spec = StartSpec {
            command: "false".into(),
            args: vec![],
            env: Environment::new(),
            cwd: std::env::temp_dir(),
            pty: false,
        };
        let mut handle = Supervisor::start(spec).await.unwrap();
        let exit = handle.wait_status().await.unwrap();
        assert!(!exit.is_success());
        assert_eq!(exit.status, 1);
    }

    #[tokio::test]
    async fn spawning_a_missing_binary_fails() {
        let spec = StartSpec {
            command: "/no/such/binary-bk-test".into(),
            args: vec![],
            env: Environment::new(),
            cwd: std::env::temp_dir(),
            pty: false,
        };
        assert!(Supervisor::start(spec).await.is_err());
    }

    #[tokio::test]
    async fn merged_output_is_observed() {
        let spec = StartSpec {
            command: "sh".into(),
            args: vec!["-c".into(), "echo out; echo err 1>&2".into()],
            env: Environment::new(),
            cwd: std::env::temp_dir(),
            pty: false,
        };
        let mut handle = Supervisor::start(spec).await.unwrap();
        let mut collected = Vec::new();
        while let Some(chunk) = handle.output.next_chunk().await {
            collected.extend_from_slice(&chunk);
        }
        let text = String::from_utf8_lossy(&collected);
        assert!(text.contains("out"));
        assert!(text.contains("err"));
        handle.wait_status().await.unwrap();
    }

    #[tokio::test]
    async fn cancel_terminates_a_process_that_ignores_sigterm() {
        let spec = StartSpec {
            command: "sh".into(),
            args: vec!["-c".into(), "trap '' TERM; sleep 30".into()],
            env: Environment::new(),
            cwd: std::env::temp_dir(),
            pty: false,
        };
        let mut handle = Supervisor::start(spec).await.unwrap();
        let exit = handle.cancel(Duration::from_millis(200)).await.unwrap();
        assert!(!exit.is_success());
    }
}
