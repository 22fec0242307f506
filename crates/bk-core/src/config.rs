// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed configuration populated once from the job's environment map.
//!
//! "Implementations should define an explicit configuration
//! structure with named fields, populated from the env map once at job
//! start; subsequent phases read the structure, not the raw map." This is
//! the structure; [`AgentConfig::from_environment`] is the one place that
//! reads the recognised keys listed

use std::time::Duration;

use crate::environment::Environment;
use crate::plugin::PluginSpec;

pub const DEFAULT_CHUNK_SIZE: usize = 100 * 1024;
pub const DEFAULT_SIGNAL_GRACE_PERIOD: Duration = Duration::from_secs(10);

fn env_bool(value: Option<&str>) -> bool {
    matches!(value, Some("true") | Some("1") | Some("on"))
}

fn env_csv(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
        .unwrap_or_default()
}

/// Git checkout behaviour, all sourced from `GIT_*`/`CLEAN_CHECKOUT`/
/// `AUTO_SSH_FINGERPRINT_VERIFICATION`.
#[derive(Debug, Clone, Default)]
pub struct GitConfig {
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub commit: Option<String>,
    pub tag: Option<String>,
    pub pull_request: Option<String>,
    pub clone_flags: Option<String>,
    pub clean_flags: Option<String>,
    pub fetch_flags: Option<String>,
    pub checkout_flags: Option<String>,
    pub clone_mirror_flags: Option<String>,
    pub clone_depth: Option<u32>,
    pub clone_filter: Option<String>,
    pub sparse_checkout: bool,
    pub sparse_checkout_paths: Vec<String>,
    pub clean_checkout: bool,
    pub auto_ssh_fingerprint_verification: bool,
    pub submodules: bool,
}

/// Docker-compose reshaping of the `command` phase.
#[derive(Debug, Clone, Default)]
pub struct DockerConfig {
    pub docker: Option<String>,
    pub docker_file: Option<String>,
    pub compose_container: Option<String>,
    pub compose_file: Vec<String>,
    pub compose_build_all: bool,
}

/// The full set of recognised job configuration, populated once at job
/// start from [`Job::initial_environment`](crate::job::Job::initial_environment).
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub command: Option<String>,
    pub artifact_paths: Vec<String>,
    pub git: GitConfig,
    pub docker: DockerConfig,
    pub plugins: Vec<PluginSpec>,
    pub chunk_size_limit: usize,
    pub signal_grace_period: Duration,
}

impl AgentConfig {
    pub fn from_environment(env: &Environment) -> Self {
        let git = GitConfig {
            repo: env.get("REPO").map(String::from),
            branch: env.get("BRANCH").map(String::from),
            commit: env.get("COMMIT").map(String::from),
            tag: env.get("TAG").map(String::from),
            pull_request: env.get("PULL_REQUEST").map(String::from),
            clone_flags: env.get("GIT_CLONE_FLAGS").map(String::from),
            clean_flags: env.get("GIT_CLEAN_FLAGS").map(String::from),
            fetch_flags: env.get("GIT_FETCH_FLAGS").map(String::from),
            checkout_flags: env.get("GIT_CHECKOUT_FLAGS").map(String::from),
            clone_mirror_flags: env.get("GIT_CLONE_MIRROR_FLAGS").map(String::from),
            clone_depth: env.get("GIT_CLONE_DEPTH").and_then(|v| v.parse().ok()),
            clone_filter: env.get("GIT_CLONE_FILTER").map(String::from),
            sparse_checkout: env_bool(env.get("GIT_SPARSE_CHECKOUT")),
            sparse_checkout_paths: env_csv(env.get("GIT_SPARSE_CHECKOUT_PATHS")),
            clean_checkout: env_bool(env.get("CLEAN_CHECKOUT")),
            auto_ssh_fingerprint_verification: env_bool(env.get("AUTO_SSH_FINGERPRINT_VERIFICATION")),
            submodules: !env_bool(env.get("GIT_SUBMODULES_DISABLE")),
        };

        let docker = DockerConfig {
            docker: env.get("DOCKER").map(String::from),
            docker_file: env.get("DOCKER_FILE").map(String::from),
            compose_container: env.get("DOCKER_COMPOSE_CONTAINER").map(String::from),
            compose_file: env
                .get("DOCKER_COMPOSE_FILE")
                .map(|v| v.split(':').map(String::from).collect())
                .unwrap_or_default(),
            compose_build_all: env_bool(env.get("DOCKER_COMPOSE_BUILD_ALL")),
        };

        let plugins = env
            .get("PLUGINS")
            .and_then(|raw| serde_json::from_str::<Vec<std::collections::HashMap<String, serde_json::Value>>>(raw).ok())
            .map(|entries| {
                entries
                    .into_iter()
                    .filter_map(|mut entry| {
                        let (source_ref, config) = entry.drain().next()?;
                        Some(PluginSpec { source_ref, config })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            command: env.get("COMMAND").map(String::from),
            artifact_paths: env_csv(env.get("ARTIFACT_PATHS")),
            git,
            docker,
            plugins,
            chunk_size_limit: DEFAULT_CHUNK_SIZE,
            signal_grace_period: DEFAULT_SIGNAL_GRACE_PERIOD,
        }
    }

    pub fn has_artifacts(&self) -> bool {
        !self.artifact_paths.is_empty()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
