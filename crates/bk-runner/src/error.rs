// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("i/o error on the runner socket: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed rpc frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("timed out waiting for all {expected} clients to register, {registered} registered")]
    StartupTimeout { expected: u32, registered: u32 },

    #[error("client {id} was lost (no response for longer than the liveness threshold)")]
    ClientLost { id: u32 },
}
