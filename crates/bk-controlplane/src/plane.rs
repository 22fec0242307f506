// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The control-plane collaborator, described only at its
//! interface: "the core treats the client as opaque". No implementation of
//! the HTTP transport lives in this crate or is ever expected to — that is
//! deliberately out of scope.

use bk_core::{ControlPlaneError, Job, JobId, LogChunk, ProcessExit};

#[async_trait::async_trait]
pub trait ControlPlane: Send + Sync {
    async fn register(&self) -> Result<(), ControlPlaneError>;
    async fn connect(&self) -> Result<(), ControlPlaneError>;
    async fn disconnect(&self) -> Result<(), ControlPlaneError>;
    async fn ping(&self) -> Result<(), ControlPlaneError>;
    async fn acquire_job(&self, job_id: &JobId) -> Result<Job, ControlPlaneError>;
    async fn start_job(&self, job_id: &JobId, started_at_epoch_ms: u64) -> Result<(), ControlPlaneError>;
    async fn finish_job(
        &self,
        job_id: &JobId,
        finished_at_epoch_ms: u64,
        exit: &ProcessExit,
        failed_chunk_count: u64,
    ) -> Result<(), ControlPlaneError>;
    async fn upload_chunk(&self, job_id: &JobId, chunk: LogChunk) -> Result<(), ControlPlaneError>;
    async fn get_meta_data(&self, job_id: &JobId, key: &str) -> Result<Option<String>, ControlPlaneError>;
    async fn set_meta_data(&self, job_id: &JobId, key: &str, value: &str) -> Result<(), ControlPlaneError>;
    async fn meta_data_exists(&self, job_id: &JobId, key: &str) -> Result<bool, ControlPlaneError>;
    async fn update_step(&self, job_id: &JobId, fields: serde_json::Value) -> Result<(), ControlPlaneError>;
    async fn upload_artifacts(&self, job_id: &JobId, paths: &[String]) -> Result<(), ControlPlaneError>;
    /// Polled by the Job Runner's cancellation-watching task; `true` once
    /// the control plane has marked the job cancelled.
    async fn is_cancelled(&self, job_id: &JobId) -> Result<bool, ControlPlaneError>;
}
