// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drives the fixed-order phase pipeline: discovers and runs each phase's
//! hooks, falls back to the built-in checkout/command defaults where no
//! hook supplies one, applies each hook's environment mutations, and
//! decides which later phases a failure skips.

use std::path::PathBuf;

use bk_core::{AgentConfig, Environment, JobId, PhaseKind, ProcessExit, SignalReason};
use bk_controlplane::ControlPlane;
use bk_hooks::{HookExecutor, HookLocations, HookOutcome};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::artifact::default_artifact_upload;
use crate::checkout::{default_checkout, report_checkout_result};
use crate::docker;
use crate::error::PipelineError;
use crate::process_run::run_streamed_cancellable;

/// Inputs the pipeline needs that don't belong to a single phase: the
/// checkout root, where hooks are discovered from, the control-plane
/// collaborator for the artifact-upload default, a cancellation signal the
/// currently-running command observes, and a sink for every byte of output
/// any phase produces.
pub struct PipelineContext<'a> {
    pub checkout_dir: PathBuf,
    pub hook_locations: HookLocations,
    pub config: &'a AgentConfig,
    pub control_plane: &'a dyn ControlPlane,
    pub job_id: &'a JobId,
    pub cancel: &'a CancellationToken,
    pub on_output: &'a mut dyn FnMut(&str, &[u8]),
}

/// What happened running one phase: whether it ran at all, and — if it
/// did — whether the result should abort later phases.
#[derive(Debug)]
struct PhaseResult {
    ran: bool,
    failed: bool,
}

/// Runs every [`PhaseKind`] in order and produces the job's final exit.
pub struct PhasePipeline;

impl PhasePipeline {
    pub async fn run(ctx: &mut PipelineContext<'_>, env: &mut Environment) -> Result<ProcessExit, PipelineError> {
        let mut propagated_failure = false;
        let mut command_exit = ProcessExit::success();

        for phase in PhaseKind::ALL {
            if ctx.cancel.is_cancelled() && phase != PhaseKind::PreExit {
                info!(%phase, "job cancelled, skipping remaining phases");
                continue;
            }
            if propagated_failure && phase != PhaseKind::PreExit {
                info!(%phase, "skipping phase after an earlier phase failed");
                continue;
            }

            let result = match phase {
                PhaseKind::Checkout => Self::run_checkout_phase(ctx, env).await?,
                PhaseKind::Command => {
                    let (result, exit) = Self::run_command_phase(ctx, env).await?;
                    command_exit = exit;
                    result
                }
                PhaseKind::ArtifactUpload if !ctx.config.has_artifacts() => {
                    info!("no artifact paths configured, skipping artifact-upload phase");
                    PhaseResult { ran: false, failed: false }
                }
                PhaseKind::ArtifactUpload => Self::run_artifact_upload_phase(ctx, env).await?,
                _ => Self::run_hook_phase(ctx, phase, env).await?,
            };

            if result.ran && result.failed && phase.failure_propagates() {
                warn!(%phase, "phase failed, later phases will be skipped (pre-exit still runs)");
                propagated_failure = true;
            }
        }

        if ctx.cancel.is_cancelled() && command_exit.is_success() {
            return Ok(ProcessExit::from_status(1).with_reason(SignalReason::Cancel));
        }
        Ok(if propagated_failure {
            command_exit_or_failure(command_exit)
        } else {
            command_exit
        })
    }

    async fn run_hook_phase(
        ctx: &mut PipelineContext<'_>,
        phase: PhaseKind,
        env: &mut Environment,
    ) -> Result<PhaseResult, PipelineError> {
        let hooks = ctx.hook_locations.existing(phase.name());
        if hooks.is_empty() {
            return Ok(PhaseResult { ran: false, failed: false });
        }

        let mut failed = false;
        for hook in hooks {
            let outcome = HookExecutor::run(&hook.path, env, &ctx.checkout_dir).await?;
            if let HookOutcome::Ran { diff, .. } = &outcome {
                env.apply_diff(diff);
            }
            if outcome.is_failure() {
                failed = true;
                break;
            }
        }
        Ok(PhaseResult { ran: true, failed })
    }

    /// Checkout is special: it has a built-in default, but any hook supplied
    /// by the job (local or plugin) takes over entirely and suppresses it.
    async fn run_checkout_phase(
        ctx: &mut PipelineContext<'_>,
        env: &mut Environment,
    ) -> Result<PhaseResult, PipelineError> {
        let hooks = ctx.hook_locations.existing(PhaseKind::Checkout.name());
        if !hooks.is_empty() {
            return Self::run_hook_phase(ctx, PhaseKind::Checkout, env).await;
        }

        info!("no checkout hook supplied, running the default checkout");
        let outcome = default_checkout(&ctx.checkout_dir, &ctx.config.git, env, &mut |bytes| {
            (ctx.on_output)(PhaseKind::Checkout.name(), bytes);
        })
        .await;

        match outcome {
            Ok(result) => {
                if let Err(err) = report_checkout_result(ctx.control_plane, ctx.job_id, &result).await {
                    warn!(error = %err, "failed to report checkout result to control plane");
                }
                env.set("BUILDKITE_COMMIT", result.commit);
                env.set("BUILDKITE_BRANCH", result.branch);
                Ok(PhaseResult { ran: true, failed: false })
            }
            Err(err) => {
                warn!(error = %err, "default checkout failed");
                Ok(PhaseResult { ran: true, failed: true })
            }
        }
    }

    /// `artifact-upload` has a built-in default too: any job-supplied hook
    /// takes over entirely (the same suppression rule as `checkout`).
    async fn run_artifact_upload_phase(
        ctx: &mut PipelineContext<'_>,
        env: &mut Environment,
    ) -> Result<PhaseResult, PipelineError> {
        let hooks = ctx.hook_locations.existing(PhaseKind::ArtifactUpload.name());
        if !hooks.is_empty() {
            return Self::run_hook_phase(ctx, PhaseKind::ArtifactUpload, env).await;
        }

        match default_artifact_upload(ctx.control_plane, ctx.job_id, &ctx.checkout_dir, &ctx.config.artifact_paths).await {
            Ok(()) => Ok(PhaseResult { ran: true, failed: false }),
            Err(err) => {
                warn!(error = %err, "default artifact upload failed");
                Ok(PhaseResult { ran: true, failed: true })
            }
        }
    }

    /// `command` also has a built-in default: the job's literal `COMMAND`,
    /// run directly when no `command` hook exists.
    async fn run_command_phase(
        ctx: &mut PipelineContext<'_>,
        env: &mut Environment,
    ) -> Result<(PhaseResult, ProcessExit), PipelineError> {
        let hooks = ctx.hook_locations.existing(PhaseKind::Command.name());
        if !hooks.is_empty() {
            let result = Self::run_hook_phase(ctx, PhaseKind::Command, env).await?;
            let exit = env
                .get("LAST_HOOK_EXIT_STATUS")
                .and_then(|s| s.parse::<i32>().ok())
                .map(ProcessExit::from_status)
                .unwrap_or_else(ProcessExit::success);
            env.set("COMMAND_EXIT_STATUS", exit.status.to_string());
            return Ok((result, exit));
        }

        let Some(command) = ctx.config.command.clone() else {
            info!("no command hook and no COMMAND configured, skipping command phase");
            return Ok((PhaseResult { ran: false, failed: false }, ProcessExit::success()));
        };

        let exit = if docker::is_configured(&ctx.config.docker) {
            docker::run_reshaped(
                &ctx.config.docker,
                ctx.job_id,
                &command,
                &ctx.checkout_dir,
                env,
                ctx.cancel,
                ctx.config.signal_grace_period,
                &mut |bytes| (ctx.on_output)(PhaseKind::Command.name(), bytes),
            )
            .await?
        } else {
            run_streamed_cancellable(
                "sh",
                &["-c".to_string(), command],
                &ctx.checkout_dir,
                env,
                ctx.cancel,
                ctx.config.signal_grace_period,
                &mut |bytes| (ctx.on_output)(PhaseKind::Command.name(), bytes),
            )
            .await?
        };
        env.set("COMMAND_EXIT_STATUS", exit.status.to_string());
        Ok((PhaseResult { ran: true, failed: !exit.is_success() }, exit))
    }
}

fn command_exit_or_failure(command_exit: ProcessExit) -> ProcessExit {
    if command_exit.is_success() {
        ProcessExit::from_status(1).with_reason(SignalReason::ProcessRunError)
    } else {
        command_exit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bk_core::{ControlPlaneError, GitConfig, Job, LogChunk};

    struct NoOpControlPlane;

    #[async_trait::async_trait]
    impl ControlPlane for NoOpControlPlane {
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
        async fn acquire_job(&self, _job_id: &JobId) -> Result<Job, ControlPlaneError> {
            unreachable!("not exercised by these tests")
        }
        async fn start_job(&self, _job_id: &JobId, _started_at_epoch_ms: u64) -> Result<(), ControlPlaneError> {
            Ok(())
        }
        async fn finish_job(
            &self,
            _job_id: &JobId,
            _finished_at_epoch_ms: u64,
            _exit: &ProcessExit,
            _failed_chunk_count: u64,
        ) -> Result<(), ControlPlaneError> {
            Ok(())
        }
        async fn upload_chunk(&self, _job_id: &JobId, _chunk: LogChunk) -> Result<(), ControlPlaneError> {
            Ok(())
        }
        async fn get_meta_data(&self, _job_id: &JobId, _key: &str) -> Result<Option<String>, ControlPlaneError> {
            Ok(None)
        }
        async fn set_meta_data(&self, _job_id: &JobId, _key: &str, _value: &str) -> Result<(), ControlPlaneError> {
            Ok(())
        }
        async fn meta_data_exists(&self, _job_id: &JobId, _key: &str) -> Result<bool, ControlPlaneError> {
            Ok(false)
        }
        async fn update_step(&self, _job_id: &JobId, _fields: serde_json::Value) -> Result<(), ControlPlaneError> {
            Ok(())
        }
        async fn upload_artifacts(&self, _job_id: &JobId, _paths: &[String]) -> Result<(), ControlPlaneError> {
            Ok(())
        }
        async fn is_cancelled(&self, _job_id: &JobId) -> Result<bool, ControlPlaneError> {
            Ok(false)
        }
    }

    fn empty_hook_locations(checkout_dir: PathBuf) -> HookLocations {
        HookLocations { global_dirs: vec![], checkout_dir, plugin_dirs: vec![] }
    }

    /// Drop a no-op `checkout` hook so tests that only care about later
    /// phases don't have to exercise the default git checkout.
    fn stub_out_checkout(checkout_dir: &std::path::Path) {
        let hooks_dir = bk_hooks::local_hooks_dir(checkout_dir);
        std::fs::create_dir_all(&hooks_dir).unwrap();
        let hook_path = hooks_dir.join("checkout");
        std::fs::write(&hook_path, "#!/bin/sh\nexit 0\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&hook_path).unwrap().permissions();
            perms.set_mode(0o700);
            std::fs::set_permissions(&hook_path, perms).unwrap();
        }
    }

    fn bare_config() -> AgentConfig {
        AgentConfig {
            command: None,
            artifact_paths: vec![],
            git: GitConfig::default(),
            docker: Default::default(),
            plugins: vec![],
            chunk_size_limit: bk_core::config::DEFAULT_CHUNK_SIZE,
            signal_grace_period: std::time::Duration::from_secs(1),
        }
    }

    fn write_executable(path: &std::path::Path, script: &str) {
        std::fs::write(path, script).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(path).unwrap().permissions();
            perms.set_mode(0o700);
            std::fs::set_permissions(path, perms).unwrap();
        }
    }

    #[tokio::test]
    async fn a_post_command_hook_does_not_clobber_command_exit_status_before_pre_exit_sees_it() {
        let dir = tempfile::tempdir().unwrap();
        stub_out_checkout(dir.path());
        let hooks_dir = bk_hooks::local_hooks_dir(dir.path());
        write_executable(&hooks_dir.join("post-command"), "#!/bin/sh\nexit 0\n");
        let marker = dir.path().join("pre-exit-status");
        write_executable(
            &hooks_dir.join("pre-exit"),
            &format!("#!/bin/sh\necho \"$COMMAND_EXIT_STATUS\" > {}\n", marker.display()),
        );
        let mut config = bare_config();
        config.command = Some("exit 3".into());
        let mut ctx = PipelineContext {
            checkout_dir: dir.path().to_path_buf(),
            hook_locations: empty_hook_locations(dir.path().to_path_buf()),
            config: &config,
            control_plane: &NoOpControlPlane,
            job_id: &JobId::new(),
            cancel: &CancellationToken::new(),
            on_output: &mut |_, _| {},
        };
        let mut env = Environment::new();
        let exit = PhasePipeline::run(&mut ctx, &mut env).await.unwrap();
        assert_eq!(exit.status, 3);
        assert_eq!(std::fs::read_to_string(&marker).unwrap().trim(), "3");
    }

    #[tokio::test]
    async fn cancelling_mid_command_interrupts_it_instead_of_running_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        stub_out_checkout(dir.path());
        let mut config = bare_config();
        config.command = Some("sleep 30".into());
        config.signal_grace_period = std::time::Duration::from_millis(200);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut ctx = PipelineContext {
            checkout_dir: dir.path().to_path_buf(),
            hook_locations: empty_hook_locations(dir.path().to_path_buf()),
            config: &config,
            control_plane: &NoOpControlPlane,
            job_id: &JobId::new(),
            cancel: &cancel,
            on_output: &mut |_, _| {},
        };
        let mut env = Environment::new();
        let started = std::time::Instant::now();
        let exit = PhasePipeline::run(&mut ctx, &mut env).await.unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        assert_eq!(exit.reason, Some(SignalReason::Cancel));
    }

    #[tokio::test]
    async fn a_successful_command_runs_to_completion_with_no_hooks() {
        let dir = tempfile::tempdir().unwrap();
        stub_out_checkout(dir.path());
        let mut config = bare_config();
        config.command = Some("exit 0".into());
        let mut output = Vec::new();
        let mut ctx = PipelineContext {
            checkout_dir: dir.path().to_path_buf(),
            hook_locations: empty_hook_locations(dir.path().to_path_buf()),
            config: &config,
            control_plane: &NoOpControlPlane,
            job_id: &JobId::new(),
            cancel: &CancellationToken::new(),
            on_output: &mut |_, bytes| output.extend_from_slice(bytes),
        };
        let mut env = Environment::new();
        let exit = PhasePipeline::run(&mut ctx, &mut env).await.unwrap();
        assert!(exit.is_success());
    }

    #[tokio::test]
    async fn a_failing_command_still_runs_post_command_but_job_exit_reflects_the_failure() {
        let dir = tempfile::tempdir().unwrap();
        stub_out_checkout(dir.path());
        let mut config = bare_config();
        config.command = Some("exit 7".into());
        let mut ctx = PipelineContext {
            checkout_dir: dir.path().to_path_buf(),
            hook_locations: empty_hook_locations(dir.path().to_path_buf()),
            config: &config,
            control_plane: &NoOpControlPlane,
            job_id: &JobId::new(),
            cancel: &CancellationToken::new(),
            on_output: &mut |_, _| {},
        };
        let mut env = Environment::new();
        let exit = PhasePipeline::run(&mut ctx, &mut env).await.unwrap();
        assert_eq!(exit.status, 7);
    }

    #[tokio::test]
    async fn no_command_and_no_hook_skips_the_command_phase_successfully() {
        let dir = tempfile::tempdir().unwrap();
        stub_out_checkout(dir.path());
        let config = bare_config();
        let mut ctx = PipelineContext {
            checkout_dir: dir.path().to_path_buf(),
            hook_locations: empty_hook_locations(dir.path().to_path_buf()),
            config: &config,
            control_plane: &NoOpControlPlane,
            job_id: &JobId::new(),
            cancel: &CancellationToken::new(),
            on_output: &mut |_, _| {},
        };
        let mut env = Environment::new();
        let exit = PhasePipeline::run(&mut ctx, &mut env).await.unwrap();
        assert!(exit.is_success());
    }
}
