// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reshapes the `command` phase into a container build/run/kill/rm/down
//! sequence when `DOCKER*` configuration is present, under a project name
//! derived from the job ID so concurrent jobs on one host never collide.

use std::path::Path;
use std::time::Duration;

use bk_core::{DockerConfig, Environment, JobId, ProcessExit};
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::process_run::{run_streamed, run_streamed_cancellable};

/// Whether any `DOCKER*` key was set, i.e. whether `command` should be
/// reshaped instead of run directly with `sh -c`.
pub(crate) fn is_configured(docker: &DockerConfig) -> bool {
    docker.docker.is_some() || docker.docker_file.is_some() || docker.compose_container.is_some()
}

fn project_name(job_id: &JobId) -> String {
    let sanitized: String = job_id
        .to_string()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    format!("bk-{sanitized}")
}

/// `run`, `kill`, and `rm` all need the same `-p project -f file...` prefix.
fn compose_base_args(docker: &DockerConfig, project: &str) -> Vec<String> {
    let mut args = vec!["-p".to_string(), project.to_string()];
    let files = if docker.compose_file.is_empty() {
        vec!["docker-compose.yml".to_string()]
    } else {
        docker.compose_file.clone()
    };
    for file in files {
        args.push("-f".to_string());
        args.push(file);
    }
    args
}

/// Build (all services, or just the target, per `DOCKER_COMPOSE_BUILD_ALL`),
/// run `command` inside the configured service, then always kill/rm the
/// container and bring the compose project down, win or lose.
#[allow(clippy::too_many_arguments)]
async fn run_compose(
    docker: &DockerConfig,
    project: &str,
    service: &str,
    command: &str,
    cwd: &Path,
    env: &Environment,
    cancel: &CancellationToken,
    grace_period: Duration,
    on_output: &mut dyn FnMut(&[u8]),
) -> Result<ProcessExit, PipelineError> {
    let base = compose_base_args(docker, project);

    let mut build_args = base.clone();
    build_args.push("build".to_string());
    if !docker.compose_build_all {
        build_args.push(service.to_string());
    }
    run_streamed("docker-compose", &build_args, cwd, env, on_output).await?;

    let mut run_args = base.clone();
    run_args.push("run".to_string());
    run_args.push("--rm".to_string());
    run_args.push(service.to_string());
    run_args.push("/bin/sh".to_string());
    run_args.push("-c".to_string());
    run_args.push(command.to_string());
    let result = run_streamed_cancellable("docker-compose", &run_args, cwd, env, cancel, grace_period, on_output).await;

    let mut kill_args = base.clone();
    kill_args.push("kill".to_string());
    let _ = run_streamed("docker-compose", &kill_args, cwd, env, &mut |_| {}).await;

    let mut rm_args = base.clone();
    rm_args.push("rm".to_string());
    rm_args.push("-f".to_string());
    let _ = run_streamed("docker-compose", &rm_args, cwd, env, &mut |_| {}).await;

    let mut down_args = base;
    down_args.push("down".to_string());
    let _ = run_streamed("docker-compose", &down_args, cwd, env, &mut |_| {}).await;

    result
}

/// `DOCKER` (plus an optional `DOCKER_FILE`) without a compose container:
/// build a one-off image tagged with the project name, run the command in
/// it, then always kill/rm the container.
#[allow(clippy::too_many_arguments)]
async fn run_plain_docker(
    docker: &DockerConfig,
    project: &str,
    image: &str,
    command: &str,
    cwd: &Path,
    env: &Environment,
    cancel: &CancellationToken,
    grace_period: Duration,
    on_output: &mut dyn FnMut(&[u8]),
) -> Result<ProcessExit, PipelineError> {
    if let Some(dockerfile) = &docker.docker_file {
        let build_args =
            vec!["build".to_string(), "-f".to_string(), dockerfile.clone(), "-t".to_string(), image.to_string(), ".".to_string()];
        run_streamed("docker", &build_args, cwd, env, on_output).await?;
    }

    let run_args = vec![
        "run".to_string(),
        "--name".to_string(),
        project.to_string(),
        image.to_string(),
        "/bin/sh".to_string(),
        "-c".to_string(),
        command.to_string(),
    ];
    let result = run_streamed_cancellable("docker", &run_args, cwd, env, cancel, grace_period, on_output).await;

    let _ = run_streamed("docker", &["kill".to_string(), project.to_string()], cwd, env, &mut |_| {}).await;
    let _ = run_streamed("docker", &["rm".to_string(), "-f".to_string(), project.to_string()], cwd, env, &mut |_| {}).await;

    result
}

/// Reshape `command` per `docker` and run it, preferring the compose path
/// when a compose container is configured.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_reshaped(
    docker: &DockerConfig,
    job_id: &JobId,
    command: &str,
    cwd: &Path,
    env: &Environment,
    cancel: &CancellationToken,
    grace_period: Duration,
    on_output: &mut dyn FnMut(&[u8]),
) -> Result<ProcessExit, PipelineError> {
    let project = project_name(job_id);
    if let Some(service) = &docker.compose_container {
        return run_compose(docker, &project, service, command, cwd, env, cancel, grace_period, on_output).await;
    }
    let image = docker.docker.clone().unwrap_or_else(|| project.clone());
    run_plain_docker(docker, &project, &image, command, cwd, env, cancel, grace_period, on_output).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docker_is_not_configured_when_no_docker_keys_are_set() {
        assert!(!is_configured(&DockerConfig::default()));
    }

    #[test]
    fn a_bare_docker_image_is_enough_to_configure_reshaping() {
        let docker = DockerConfig { docker: Some("ruby:3".into()), ..Default::default() };
        assert!(is_configured(&docker));
    }

    #[test]
    fn project_name_is_lowercase_and_dash_safe() {
        let job_id = JobId::new();
        let name = project_name(&job_id);
        assert!(name.starts_with("bk-"));
        assert!(name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }

    #[test]
    fn compose_base_args_falls_back_to_docker_compose_yml() {
        let docker = DockerConfig::default();
        assert_eq!(compose_base_args(&docker, "bk-abc"), vec!["-p", "bk-abc", "-f", "docker-compose.yml"]);
    }

    #[test]
    fn compose_base_args_uses_every_configured_file() {
        let docker = DockerConfig { compose_file: vec!["a.yml".into(), "b.yml".into()], ..Default::default() };
        assert_eq!(compose_base_args(&docker, "bk-abc"), vec!["-p", "bk-abc", "-f", "a.yml", "-f", "b.yml"]);
    }
}
