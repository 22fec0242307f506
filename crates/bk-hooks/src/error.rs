// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HooksError {
    #[error("failed to write hook wrapper script: {0}")]
    WrapperWrite(#[source] std::io::Error),

    #[error(transparent)]
    Supervisor(#[from] bk_supervisor::SupervisorError),

    #[error("failed to wait for hook wrapper: {0}")]
    Wait(#[source] bk_supervisor::SupervisorError),
}
