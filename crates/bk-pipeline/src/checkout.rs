// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The built-in default checkout, used whenever no plugin or local hook
//! supplies its own `checkout` hook.

use std::path::Path;

use bk_core::{ControlPlaneError, Environment, GitConfig};
use tracing::info;

use crate::error::PipelineError;
use crate::process_run::{run_captured, run_git};

/// Host (and non-default port, if any) embedded in an SSH-style remote:
/// either `ssh://host[:port]/...` or the scp-like `user@host:path`.
fn ssh_host(repo: &str) -> Option<(String, Option<u16>)> {
    if let Some(rest) = repo.strip_prefix("ssh://") {
        let after_user = rest.rsplit_once('@').map(|(_, h)| h).unwrap_or(rest);
        let host_part = after_user.split('/').next()?;
        let mut parts = host_part.splitn(2, ':');
        let host = parts.next()?.to_string();
        let port = parts.next().and_then(|p| p.parse().ok());
        return Some((host, port));
    }
    if !repo.contains("://") {
        if let Some((user_host, _path)) = repo.split_once(':') {
            if let Some((_, host)) = user_host.rsplit_once('@') {
                return Some((host.to_string(), None));
            }
        }
    }
    None
}

/// `AUTO_SSH_FINGERPRINT_VERIFICATION`: seed `~/.ssh/known_hosts` with the
/// remote's key via `ssh-keyscan` before git ever tries to connect, so a
/// fresh host doesn't block on an interactive fingerprint prompt.
async fn verify_ssh_fingerprint(repo: &str, env: &Environment) -> Result<(), PipelineError> {
    let Some((host, port)) = ssh_host(repo) else {
        return Ok(());
    };
    let home = env.get("HOME").map(String::from).or_else(|| std::env::var("HOME").ok());
    let Some(home) = home else {
        info!(host, "no HOME available, skipping ssh-keyscan");
        return Ok(());
    };
    let ssh_dir = Path::new(&home).join(".ssh");
    tokio::fs::create_dir_all(&ssh_dir).await?;

    let mut args = vec!["-H".to_string()];
    if let Some(port) = port {
        args.push("-p".to_string());
        args.push(port.to_string());
    }
    args.push(host.clone());

    info!(host, "running ssh-keyscan to seed known_hosts");
    let (exit, keys) = run_captured("ssh-keyscan", &args, Path::new("."), env).await?;
    if !exit.is_success() || keys.is_empty() {
        return Ok(());
    }

    let known_hosts = ssh_dir.join("known_hosts");
    let mut contents = tokio::fs::read_to_string(&known_hosts).await.unwrap_or_default();
    if !contents.is_empty() && !contents.ends_with('\n') {
        contents.push('\n');
    }
    contents.push_str(&keys);
    contents.push('\n');
    tokio::fs::write(&known_hosts, contents).await?;
    Ok(())
}

/// Resolved VCS coordinates reported after a checkout completes.
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub commit: String,
    pub branch: String,
}

/// Clone or fetch `git.repo` into `checkout_dir` and leave the working tree
/// at the configured ref, cleaned of anything not tracked by git.
pub async fn default_checkout(
    checkout_dir: &Path,
    git: &GitConfig,
    env: &Environment,
    on_output: &mut dyn FnMut(&[u8]),
) -> Result<CheckoutOutcome, PipelineError> {
    let repo = git.repo.as_deref().ok_or_else(|| {
        PipelineError::GitFailed { command: "git clone".into(), exit_status: -1 }
    })?;

    tokio::fs::create_dir_all(checkout_dir).await?;

    if git.auto_ssh_fingerprint_verification {
        verify_ssh_fingerprint(repo, env).await?;
    }

    if git.clean_checkout {
        info!(dir = %checkout_dir.display(), "clean checkout requested, clearing working tree");
        clear_directory(checkout_dir).await?;
    }

    if !checkout_dir.join(".git").exists() {
        clone(repo, checkout_dir, git, env, on_output).await?;
    } else {
        fetch_and_reset(checkout_dir, git, env, on_output).await?;
    }

    checkout_ref(checkout_dir, git, env, on_output).await?;

    if git.submodules {
        run_git(&["submodule", "sync", "--recursive"], checkout_dir, env, on_output).await?;
        run_git(&["submodule", "update", "--init", "--recursive"], checkout_dir, env, on_output).await?;
        run_git(&["clean", "-ffxdq"], checkout_dir, env, on_output).await?;
        run_git(&["submodule", "foreach", "--recursive", "git clean -ffxdq"], checkout_dir, env, on_output).await?;
    } else {
        run_git(&["clean", "-ffxdq"], checkout_dir, env, on_output).await?;
    }

    resolve_ref(checkout_dir, env).await
}

async fn clone(
    repo: &str,
    checkout_dir: &Path,
    git: &GitConfig,
    env: &Environment,
    on_output: &mut dyn FnMut(&[u8]),
) -> Result<(), PipelineError> {
    let mut args = vec!["clone".to_string()];
    if let Some(depth) = git.clone_depth {
        args.push("--depth".into());
        args.push(depth.to_string());
    }
    if let Some(filter) = &git.clone_filter {
        args.push("--filter".into());
        args.push(filter.clone());
    }
    if git.sparse_checkout {
        args.push("--sparse".into());
    }
    if let Some(extra) = &git.clone_flags {
        args.extend(extra.split_whitespace().map(String::from));
    }
    args.push(repo.to_string());
    args.push(".".to_string());
    run_git(&args.iter().map(String::as_str).collect::<Vec<_>>(), checkout_dir, env, on_output).await?;

    if git.sparse_checkout && !git.sparse_checkout_paths.is_empty() {
        let mut sparse_args = vec!["sparse-checkout".to_string(), "set".to_string()];
        sparse_args.extend(git.sparse_checkout_paths.iter().cloned());
        run_git(&sparse_args.iter().map(String::as_str).collect::<Vec<_>>(), checkout_dir, env, on_output).await?;
    }
    Ok(())
}

async fn fetch_and_reset(
    checkout_dir: &Path,
    git: &GitConfig,
    env: &Environment,
    on_output: &mut dyn FnMut(&[u8]),
) -> Result<(), PipelineError> {
    let mut args = vec!["fetch".to_string(), "origin".to_string()];
    if let Some(extra) = &git.fetch_flags {
        args.extend(extra.split_whitespace().map(String::from));
    }
    run_git(&args.iter().map(String::as_str).collect::<Vec<_>>(), checkout_dir, env, on_output).await?;
    let target = fetch_target(git);
    run_git(&["reset", "--hard", &target], checkout_dir, env, on_output).await
}

async fn checkout_ref(
    checkout_dir: &Path,
    git: &GitConfig,
    env: &Environment,
    on_output: &mut dyn FnMut(&[u8]),
) -> Result<(), PipelineError> {
    let target = fetch_target(git);
    let mut args = vec!["checkout".to_string()];
    if let Some(extra) = &git.checkout_flags {
        args.extend(extra.split_whitespace().map(String::from));
    }
    args.push(target);
    run_git(&args.iter().map(String::as_str).collect::<Vec<_>>(), checkout_dir, env, on_output).await
}

fn fetch_target(git: &GitConfig) -> String {
    if let Some(commit) = &git.commit {
        commit.clone()
    } else if let Some(tag) = &git.tag {
        format!("refs/tags/{tag}")
    } else if let Some(branch) = &git.branch {
        format!("origin/{branch}")
    } else {
        "FETCH_HEAD".to_string()
    }
}

async fn resolve_ref(checkout_dir: &Path, env: &Environment) -> Result<CheckoutOutcome, PipelineError> {
    let (exit, commit) = run_captured("git", &["rev-parse".into(), "HEAD".into()], checkout_dir, env).await?;
    if !exit.is_success() {
        return Err(PipelineError::GitFailed { command: "git rev-parse HEAD".into(), exit_status: exit.status });
    }
    let (_, branch) = run_captured("git", &["branch".into(), "--show-current".into()], checkout_dir, env).await?;
    Ok(CheckoutOutcome { commit, branch })
}

async fn clear_directory(dir: &Path) -> Result<(), PipelineError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await?;
        } else {
            tokio::fs::remove_file(&path).await?;
        }
    }
    Ok(())
}

/// Report the resolved checkout coordinates to the control plane's per-job
/// meta-data store, the way the default checkout is expected to.
pub async fn report_checkout_result(
    control_plane: &dyn bk_controlplane::ControlPlane,
    job_id: &bk_core::JobId,
    outcome: &CheckoutOutcome,
) -> Result<(), ControlPlaneError> {
    control_plane.set_meta_data(job_id, "buildkite:git:commit", &outcome.commit).await?;
    control_plane.set_meta_data(job_id, "buildkite:git:branch", &outcome.branch).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssh_url_yields_host_and_port() {
        assert_eq!(ssh_host("ssh://git@example.com:2222/org/repo.git"), Some(("example.com".to_string(), Some(2222))));
    }

    #[test]
    fn ssh_url_without_a_port_yields_none_for_port() {
        assert_eq!(ssh_host("ssh://git@example.com/org/repo.git"), Some(("example.com".to_string(), None)));
    }

    #[test]
    fn scp_like_remote_yields_its_host() {
        assert_eq!(ssh_host("git@github.com:org/repo.git"), Some(("github.com".to_string(), None)));
    }

    #[test]
    fn an_https_remote_is_not_an_ssh_host() {
        assert_eq!(ssh_host("https://github.com/org/repo.git"), None);
    }
}
