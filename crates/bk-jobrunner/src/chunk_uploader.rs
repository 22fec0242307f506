// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bridges the Log Streamer's upload trait to the control-plane
//! collaborator's `upload_chunk` method, so bk-logstreamer never needs to
//! know bk-controlplane exists.

use std::sync::Arc;

use bk_controlplane::ControlPlane;
use bk_core::{JobId, LogChunk};
use bk_logstreamer::{ChunkUploader, UploadError};

pub struct ControlPlaneUploader {
    control_plane: Arc<dyn ControlPlane>,
    job_id: JobId,
}

impl ControlPlaneUploader {
    pub fn new(control_plane: Arc<dyn ControlPlane>, job_id: JobId) -> Self {
        Self { control_plane, job_id }
    }
}

#[async_trait::async_trait]
impl ChunkUploader for ControlPlaneUploader {
    async fn upload(&self, chunk: LogChunk) -> Result<(), UploadError> {
        self.control_plane
            .upload_chunk(&self.job_id, chunk)
            .await
            .map_err(|err| UploadError(err.to_string()))
    }
}
