// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `bk-agent` - run a single job's bootstrap/executor pipeline from the
//! command line, against either a real control plane or the bundled
//! filesystem-backed stand-in.

mod exit_error;
mod local_control_plane;

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bk_controlplane::ControlPlane;
use bk_core::{
    ControlPlaneError, Environment, Job, JobId, PluginFreshness, PluginSpec, StepMetadata,
};
use bk_jobrunner::{run_job, JobRunnerConfig};
use clap::Parser;

use exit_error::ExitError;
use local_control_plane::LocalControlPlane;

const EXIT_ACQUIRE_REJECTED: i32 = 27;
const EXIT_ACQUIRE_LOCKED: i32 = 28;
const EXIT_FATAL: i32 = 1;

/// Run one job's bootstrap/executor pipeline to completion.
#[derive(Parser)]
#[command(name = "bk-agent", version)]
struct Cli {
    /// Path to a job file (JSON) describing the job to run.
    job_file: PathBuf,

    /// Directory checkouts and commands run in.
    #[arg(long, default_value = ".")]
    checkout_dir: PathBuf,

    /// Directory plugin clones are cached under.
    #[arg(long, default_value = ".")]
    plugin_dir: PathBuf,

    /// Additional global hook directories, searched in the given order.
    #[arg(long = "hooks-dir")]
    hooks_dirs: Vec<PathBuf>,

    /// Always reclone plugins rather than reusing a cached clone.
    #[arg(long)]
    always_fresh_plugins: bool,

    /// Root directory the bundled filesystem control plane persists job
    /// state under.
    #[arg(long, default_value = ".bk-agent")]
    state_dir: PathBuf,

    /// Exit with the job's own process status instead of a fixed 0/1.
    #[arg(long)]
    reflect_exit_status: bool,

    /// Literal substrings to redact from job output.
    #[arg(long = "redact")]
    redacted_strings: Vec<String>,
}

/// The on-disk job description `bk-agent` accepts: a minimal JSON shape,
/// since `Job`/`Environment` are not directly (de)serializable (the
/// control plane, not a file on disk, is their real source of truth).
#[derive(serde::Deserialize)]
struct JobFile {
    id: Option<String>,
    #[serde(default)]
    env: Vec<(String, String)>,
    command: Option<String>,
    #[serde(default)]
    plugins: Vec<PluginSpec>,
    #[serde(default)]
    signed_fields: HashMap<String, String>,
}

impl JobFile {
    fn into_job(self) -> Job {
        let id = match self.id {
            Some(id) => JobId::from_string(id),
            None => JobId::new(),
        };
        let env = Environment::from_pairs(self.env);
        let step = StepMetadata {
            command: self.command,
            plugins: self.plugins,
            signed_fields: self.signed_fields,
        };
        Job::new(id, env, step)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => {
            let code = match err.downcast::<ExitError>() {
                Ok(exit_error) => {
                    tracing::error!(code = exit_error.code, "{}", exit_error.message);
                    exit_error.code
                }
                Err(err) => {
                    tracing::error!(error = %err, "bk-agent failed");
                    EXIT_FATAL
                }
            };
            ExitCode::from(code.clamp(0, 255) as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let raw = std::fs::read_to_string(&cli.job_file)
        .with_context(|| format!("reading job file {}", cli.job_file.display()))?;
    let job_file: JobFile =
        serde_json::from_str(&raw).with_context(|| format!("parsing job file {}", cli.job_file.display()))?;
    let job = job_file.into_job();
    let job_id = job.id;

    let control_plane: Arc<dyn ControlPlane> = Arc::new(LocalControlPlane::new(cli.state_dir, job.clone()));

    let job = match control_plane.acquire_job(&job_id).await {
        Ok(job) => job,
        Err(ControlPlaneError::Http { status: 423, body, .. }) => {
            return Err(ExitError::new(EXIT_ACQUIRE_LOCKED, body).into());
        }
        Err(err) => {
            return Err(ExitError::new(EXIT_ACQUIRE_REJECTED, err.to_string()).into());
        }
    };

    let config = JobRunnerConfig {
        global_hook_dirs: cli.hooks_dirs,
        checkout_dir: cli.checkout_dir,
        plugin_root: cli.plugin_dir,
        plugin_freshness: if cli.always_fresh_plugins {
            PluginFreshness::AlwaysFresh
        } else {
            PluginFreshness::CacheAllowed
        },
        redacted_strings: cli.redacted_strings,
        cancellation_poll_interval: Duration::from_secs(5),
        ..JobRunnerConfig::default()
    };

    let exit = run_job(job, control_plane, config)
        .await
        .context("running job")?;

    if cli.reflect_exit_status {
        return Ok(ExitCode::from(exit.status.clamp(0, 255) as u8));
    }
    Ok(if exit.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
