// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composes the control-plane handshake, the pre-bootstrap gate, plugin
//! resolution, the Log Streamer, and the Phase Pipeline into one job run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bk_controlplane::{finish_job_policy, start_job_policy, with_retry, ControlPlane};
use bk_core::{
    AgentConfig, Clock, Job, JobId, PluginFreshness, ProcessExit, SignalReason, SystemClock,
};
use bk_hooks::{HookExecutor, HookLocations, HookOutcome};
use bk_logstreamer::{LogStreamer, LogStreamerConfig};
use bk_pipeline::{cache_root, resolve_plugins, PhasePipeline, PipelineContext};
use bk_streams::Redactor;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::chunk_uploader::ControlPlaneUploader;
use crate::error::JobRunnerError;

const PRE_BOOTSTRAP_HOOK: &str = "pre-bootstrap";

pub struct JobRunnerConfig {
    /// Directories the agent itself is configured with, searched in order
    /// for every phase's hooks plus the `pre-bootstrap` gate.
    pub global_hook_dirs: Vec<PathBuf>,
    pub checkout_dir: PathBuf,
    pub plugin_root: PathBuf,
    pub plugin_freshness: PluginFreshness,
    pub log_streamer: LogStreamerConfig,
    /// Literal substrings the Redactor replaces with `[REDACTED]` in every
    /// byte of job output before it reaches the Log Streamer.
    pub redacted_strings: Vec<String>,
    pub cancellation_poll_interval: Duration,
}

impl Default for JobRunnerConfig {
    fn default() -> Self {
        Self {
            global_hook_dirs: vec![],
            checkout_dir: PathBuf::from("."),
            plugin_root: PathBuf::from("."),
            plugin_freshness: PluginFreshness::CacheAllowed,
            log_streamer: LogStreamerConfig::default(),
            redacted_strings: vec![],
            cancellation_poll_interval: Duration::from_secs(5),
        }
    }
}

/// Run one job end to end, returning the job's composed exit. Only a failure to start the job at
/// all is fatal to this call; every other failure is folded into the
/// returned [`ProcessExit`] so the caller can still report `finishJob`.
pub async fn run_job(
    job: Job,
    control_plane: Arc<dyn ControlPlane>,
    config: JobRunnerConfig,
) -> Result<ProcessExit, JobRunnerError> {
    let clock = SystemClock;
    let job_id = job.id;
    let consistent = job.signed_step_is_consistent();
    let mut env = job.initial_environment;

    if !consistent {
        warn!(%job_id, "signed step fields disagree with the delivered command, refusing job");
        return Ok(ProcessExit::refused());
    }

    {
        let control_plane = control_plane.as_ref();
        with_retry(&start_job_policy(), jitter, || async {
            control_plane.start_job(&job_id, clock.epoch_ms()).await
        })
        .await?;
    }

    let gate_locations = HookLocations {
        global_dirs: config.global_hook_dirs.clone(),
        checkout_dir: config.checkout_dir.clone(),
        plugin_dirs: vec![],
    };
    for hook in gate_locations.existing(PRE_BOOTSTRAP_HOOK) {
        let outcome = HookExecutor::run(&hook.path, &env, &config.checkout_dir).await?;
        if let HookOutcome::Ran { diff, .. } = &outcome {
            env.apply_diff(diff);
        }
        if outcome.is_failure() {
            warn!(%job_id, "pre-bootstrap hook refused the job");
            let finished_at = clock.epoch_ms();
            let exit = ProcessExit::refused();
            report_finish(control_plane.as_ref(), &job_id, finished_at, &exit, 0).await;
            return Ok(exit);
        }
    }

    let agent_config = AgentConfig::from_environment(&env);
    let resolved_plugins = resolve_plugins(
        &agent_config.plugins,
        &cache_root(&config.plugin_root),
        config.plugin_freshness,
        &env,
        &mut |_| {},
    )
    .await?;

    let hook_locations = HookLocations {
        global_dirs: config.global_hook_dirs.clone(),
        checkout_dir: config.checkout_dir.clone(),
        plugin_dirs: resolved_plugins.iter().map(|p| p.local_dir.clone()).collect(),
    };

    let uploader = Arc::new(ControlPlaneUploader::new(Arc::clone(&control_plane), job_id));
    let log_streamer = LogStreamer::start(config.log_streamer, uploader);
    let (output_tx, output_rx) = tokio::sync::mpsc::unbounded_channel::<Vec<u8>>();
    let redactor = Redactor::new(config.redacted_strings.clone());
    let log_task = tokio::spawn(drain_output(log_streamer, redactor, output_rx));

    let cancel_token = CancellationToken::new();
    let cancel_task = {
        let control_plane = Arc::clone(&control_plane);
        let job_id = job_id;
        let token = cancel_token.clone();
        let poll_interval = config.cancellation_poll_interval;
        tokio::spawn(async move {
            watch_for_cancellation(control_plane.as_ref(), &job_id, poll_interval, &token).await;
        })
    };

    let exit = {
        let control_plane_ref = control_plane.as_ref();
        let mut ctx = PipelineContext {
            checkout_dir: config.checkout_dir.clone(),
            hook_locations,
            config: &agent_config,
            control_plane: control_plane_ref,
            job_id: &job_id,
            cancel: &cancel_token,
            on_output: &mut |_phase, bytes: &[u8]| {
                let _ = output_tx.send(bytes.to_vec());
            },
        };

        match PhasePipeline::run(&mut ctx, &mut env).await {
            Ok(exit) => exit,
            Err(err) => {
                warn!(error = %err, "phase pipeline returned an error");
                ProcessExit::from_status(1).with_reason(SignalReason::ProcessRunError)
            }
        }
    };
    cancel_task.abort();

    let failed_chunks = log_task.await.unwrap_or(0);
    if failed_chunks > 0 {
        warn!(%job_id, failed_chunks, "some log chunks permanently failed to upload");
    }

    let finished_at = clock.epoch_ms();
    report_finish(control_plane.as_ref(), &job_id, finished_at, &exit, failed_chunks).await;
    Ok(exit)
}

async fn report_finish(
    control_plane: &dyn ControlPlane,
    job_id: &JobId,
    finished_at_epoch_ms: u64,
    exit: &ProcessExit,
    failed_chunk_count: u64,
) {
    let result = with_retry(&finish_job_policy(), jitter, || async {
        control_plane.finish_job(job_id, finished_at_epoch_ms, exit, failed_chunk_count).await
    })
    .await;
    if let Err(err) = result {
        warn!(%job_id, error = %err, "finishJob ultimately failed");
    }
}

async fn watch_for_cancellation(
    control_plane: &dyn ControlPlane,
    job_id: &JobId,
    poll_interval: Duration,
    token: &CancellationToken,
) {
    loop {
        match control_plane.is_cancelled(job_id).await {
            Ok(true) => {
                info!(%job_id, "job cancelled by control plane");
                token.cancel();
                return;
            }
            Ok(false) => {}
            Err(err) => warn!(%job_id, error = %err, "cancellation poll failed, retrying"),
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Redact then hand every appended chunk to the Log Streamer until the
/// sender side closes, then flush the redactor's trailing overlap and stop
/// the streamer, returning its permanently-failed chunk count.
async fn drain_output(
    mut log_streamer: LogStreamer,
    mut redactor: Redactor,
    mut output_rx: tokio::sync::mpsc::UnboundedReceiver<Vec<u8>>,
) -> u64 {
    while let Some(bytes) = output_rx.recv().await {
        let redacted = redactor.process(&bytes);
        log_streamer.append(&redacted).await;
    }
    let tail = redactor.flush();
    if !tail.is_empty() {
        log_streamer.append(&tail).await;
    }
    log_streamer.stop().await
}

fn jitter() -> f64 {
    rand::random::<f64>()
}
