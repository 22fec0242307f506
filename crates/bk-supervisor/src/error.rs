// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error kinds for the process supervisor ("Start/runtime").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn { command: String, source: std::io::Error },

    #[error("i/o error on child process: {0}")]
    Io(#[from] std::io::Error),

    #[error("posix syscall failed: {0}")]
    Signal(#[from] nix::Error),

    #[error("process has not been started")]
    NotStarted,

    #[error("process has already exited")]
    AlreadyExited,
}
