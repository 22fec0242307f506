// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Supervisor(#[from] bk_supervisor::SupervisorError),

    #[error(transparent)]
    Hooks(#[from] bk_hooks::HooksError),

    #[error("git command failed: {command} (exit {exit_status})")]
    GitFailed { command: String, exit_status: i32 },

    #[error("i/o error preparing checkout: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    ControlPlane(#[from] bk_core::ControlPlaneError),
}
