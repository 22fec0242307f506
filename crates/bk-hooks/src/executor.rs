// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::{Path, PathBuf};

use bk_core::{Environment, EnvironmentDiff};
use bk_supervisor::{StartSpec, Supervisor};
use tracing::{info, warn};

use crate::error::HooksError;
use crate::wrapper;

/// Outcome of attempting to run a hook script.
#[derive(Debug)]
pub enum HookOutcome {
    /// No file exists at the hook's path — not an error.
    Skipped,
    Ran { exit_status: i32, diff: EnvironmentDiff },
}

impl HookOutcome {
    pub fn exit_status(&self) -> i32 {
        match self {
            HookOutcome::Skipped => 0,
            HookOutcome::Ran { exit_status, .. } => *exit_status,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.exit_status() != 0
    }
}

pub struct HookExecutor;

impl HookExecutor {
    /// Run `hook_path` with `env`/`cwd`, capturing its environment
    /// mutations as an [`EnvironmentDiff`].
    pub async fn run(hook_path: &Path, env: &Environment, cwd: &Path) -> Result<HookOutcome, HooksError> {
        if !hook_path.is_file() {
            info!(hook = %hook_path.display(), "hook not present, skipping");
            return Ok(HookOutcome::Skipped);
        }

        let before = unique_dump_path("before")?;
        let after = unique_dump_path("after")?;
        let wrapper_path = unique_dump_path("wrapper")?;

        let script = wrapper::render(hook_path, &before, &after);
        tokio::fs::write(&wrapper_path, script).await.map_err(HooksError::WrapperWrite)?;
        make_executable(&wrapper_path).await.map_err(HooksError::WrapperWrite)?;

        let spec = StartSpec {
            command: wrapper_path.to_string_lossy().into_owned(),
            args: vec![],
            env: env.clone(),
            cwd: cwd.to_path_buf(),
            pty: false,
        };
        let mut handle = Supervisor::start(spec).await?;
        while handle.output.next_chunk().await.is_some() {
            // Hook output is forwarded to the job log by the caller's own
            // scanner/redactor chain wrapped around this supervisor; this
            // executor only needs to drain the pipe so the child doesn't
            // block on a full OS pipe buffer.
        }
        let exit = handle.wait_status().await.map_err(HooksError::Wait)?;

        let before_env = read_env_dump(&before).await;
        let after_env = read_env_dump(&after).await;
        let _ = tokio::fs::remove_file(&before).await;
        let _ = tokio::fs::remove_file(&after).await;
        let _ = tokio::fs::remove_file(&wrapper_path).await;

        let diff = EnvironmentDiff::compute(&before_env, &after_env);
        Ok(HookOutcome::Ran { exit_status: exit.status, diff })
    }
}

/// Parse failures become an empty environment rather than a fatal error
/// ("treat parse failures as no-diff rather than fatal").
async fn read_env_dump(path: &Path) -> Environment {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Environment::from_env_lines(&text),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read hook env dump");
            Environment::new()
        }
    }
}

/// A fresh, unique path under the system temp directory ("write
/// dumps to unique temporary paths"). Reserved via `tempfile` (the file is
/// created empty, then kept past the `NamedTempFile`'s drop so the wrapper
/// script — not this process — owns writing to it).
fn unique_dump_path(prefix: &str) -> Result<PathBuf, HooksError> {
    let named = tempfile::Builder::new()
        .prefix(&format!("bk-hook-{prefix}-"))
        .tempfile()
        .map_err(HooksError::WrapperWrite)?;
    let (_, path) = named.keep().map_err(|e| HooksError::WrapperWrite(e.error))?;
    Ok(path)
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o700);
    tokio::fs::set_permissions(path, perms).await
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
