// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A filesystem-backed `ControlPlane`, used by the `bootstrap` command in
//! place of the real control-plane HTTP client (which this workspace never
//! builds — the core treats the control plane as an external collaborator
//! reached over a transport it doesn't own). This lets a single job be
//! driven end to end from the command line without a server: job state is
//! persisted under a directory instead of sent over the wire.

use std::path::{Path, PathBuf};

use bk_controlplane::ControlPlane;
use bk_core::{ControlPlaneError, Job, JobId, LogChunk, ProcessExit};
use tokio::fs;

pub struct LocalControlPlane {
    root: PathBuf,
    job: Job,
}

impl LocalControlPlane {
    pub fn new(root: PathBuf, job: Job) -> Self {
        Self { root, job }
    }

    fn job_dir(&self, job_id: &JobId) -> PathBuf {
        self.root.join(job_id.as_str())
    }

    async fn ensure_job_dir(&self, job_id: &JobId) -> Result<PathBuf, ControlPlaneError> {
        let dir = self.job_dir(job_id);
        fs::create_dir_all(&dir).await.map_err(io_err)?;
        Ok(dir)
    }

    fn not_found(job_id: &JobId) -> ControlPlaneError {
        ControlPlaneError::Http {
            status: 404,
            body: format!("no such job: {job_id}"),
            retry_after: None,
        }
    }
}

fn io_err(err: std::io::Error) -> ControlPlaneError {
    ControlPlaneError::Transport(err.to_string())
}

#[async_trait::async_trait]
impl ControlPlane for LocalControlPlane {
    async fn register(&self) -> Result<(), ControlPlaneError> {
        Ok(())
    }

    async fn connect(&self) -> Result<(), ControlPlaneError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ControlPlaneError> {
        Ok(())
    }

    async fn ping(&self) -> Result<(), ControlPlaneError> {
        Ok(())
    }

    async fn acquire_job(&self, job_id: &JobId) -> Result<Job, ControlPlaneError> {
        if job_id.as_str() != self.job.id.as_str() {
            return Err(Self::not_found(job_id));
        }
        let dir = self.ensure_job_dir(job_id).await?;
        let lock = dir.join("lock");
        match fs::metadata(&lock).await {
            Ok(_) => Err(ControlPlaneError::Http {
                status: 423,
                body: format!("{job_id} is locked"),
                retry_after: None,
            }),
            Err(_) => {
                fs::write(&lock, b"").await.map_err(io_err)?;
                Ok(self.job.clone())
            }
        }
    }

    async fn start_job(&self, job_id: &JobId, started_at_epoch_ms: u64) -> Result<(), ControlPlaneError> {
        let dir = self.ensure_job_dir(job_id).await?;
        fs::write(dir.join("started_at"), started_at_epoch_ms.to_string()).await.map_err(io_err)
    }

    async fn finish_job(
        &self,
        job_id: &JobId,
        finished_at_epoch_ms: u64,
        exit: &ProcessExit,
        failed_chunk_count: u64,
    ) -> Result<(), ControlPlaneError> {
        let dir = self.ensure_job_dir(job_id).await?;
        let body = serde_json::json!({
            "finished_at_epoch_ms": finished_at_epoch_ms,
            "status": exit.status,
            "signal": exit.signal,
            "reason": exit.reason.map(|r| r.as_str()),
            "failed_chunk_count": failed_chunk_count,
        });
        fs::write(dir.join("finished.json"), serde_json::to_vec_pretty(&body).unwrap_or_default())
            .await
            .map_err(io_err)
    }

    async fn upload_chunk(&self, job_id: &JobId, chunk: LogChunk) -> Result<(), ControlPlaneError> {
        let dir = self.ensure_job_dir(job_id).await?;
        let chunks_dir = dir.join("chunks");
        fs::create_dir_all(&chunks_dir).await.map_err(io_err)?;
        fs::write(chunks_dir.join(format!("{:020}.log", chunk.order)), chunk.payload)
            .await
            .map_err(io_err)
    }

    async fn get_meta_data(&self, job_id: &JobId, key: &str) -> Result<Option<String>, ControlPlaneError> {
        let dir = self.job_dir(job_id).join("meta");
        match fs::read_to_string(dir.join(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_err(err)),
        }
    }

    async fn set_meta_data(&self, job_id: &JobId, key: &str, value: &str) -> Result<(), ControlPlaneError> {
        let dir = self.job_dir(job_id).join("meta");
        fs::create_dir_all(&dir).await.map_err(io_err)?;
        fs::write(dir.join(key), value).await.map_err(io_err)
    }

    async fn meta_data_exists(&self, job_id: &JobId, key: &str) -> Result<bool, ControlPlaneError> {
        Ok(fs::metadata(self.job_dir(job_id).join("meta").join(key)).await.is_ok())
    }

    async fn update_step(&self, job_id: &JobId, fields: serde_json::Value) -> Result<(), ControlPlaneError> {
        let dir = self.ensure_job_dir(job_id).await?;
        fs::write(dir.join("step.json"), serde_json::to_vec_pretty(&fields).unwrap_or_default())
            .await
            .map_err(io_err)
    }

    async fn upload_artifacts(&self, job_id: &JobId, paths: &[String]) -> Result<(), ControlPlaneError> {
        let dir = self.ensure_job_dir(job_id).await?.join("artifacts");
        fs::create_dir_all(&dir).await.map_err(io_err)?;
        for path in paths {
            let source = Path::new(path);
            if let Some(name) = source.file_name() {
                if source.is_file() {
                    fs::copy(source, dir.join(name)).await.map_err(io_err)?;
                }
            }
        }
        Ok(())
    }

    async fn is_cancelled(&self, job_id: &JobId) -> Result<bool, ControlPlaneError> {
        Ok(fs::metadata(self.job_dir(job_id).join("cancel")).await.is_ok())
    }
}
