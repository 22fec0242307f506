// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The built-in default for the `artifact-upload` phase: expand the job's
//! configured glob patterns against the checkout directory and hand the
//! matching paths to the control plane.

use std::path::Path;

use bk_core::JobId;
use tracing::{info, warn};

use crate::error::PipelineError;

/// Resolve `patterns` (comma-split globs, already split by the caller)
/// against `checkout_dir` and upload every match via `control_plane`.
pub async fn default_artifact_upload(
    control_plane: &dyn bk_controlplane::ControlPlane,
    job_id: &JobId,
    checkout_dir: &Path,
    patterns: &[String],
) -> Result<(), PipelineError> {
    let mut matches = Vec::new();
    for pattern in patterns {
        let full_pattern = checkout_dir.join(pattern);
        let full_pattern = full_pattern.to_string_lossy().into_owned();
        match glob::glob(&full_pattern) {
            Ok(paths) => {
                for entry in paths.flatten() {
                    matches.push(entry.to_string_lossy().into_owned());
                }
            }
            Err(err) => warn!(pattern, error = %err, "invalid artifact glob, skipping"),
        }
    }

    if matches.is_empty() {
        info!("no files matched the configured artifact paths");
        return Ok(());
    }

    info!(count = matches.len(), "uploading artifacts");
    control_plane.upload_artifacts(job_id, &matches).await?;
    Ok(())
}
