// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobRunnerError {
    #[error(transparent)]
    ControlPlane(#[from] bk_core::ControlPlaneError),
    #[error(transparent)]
    Hooks(#[from] bk_hooks::HooksError),
    #[error(transparent)]
    Pipeline(#[from] bk_pipeline::PipelineError),
}
