// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin resolution: clone each declared plugin once into a cache directory
//! keyed by its canonicalised (source URL, ref) pair, reusing the cache
//! unless the agent is configured to always fetch fresh.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use bk_core::{Environment, PluginFreshness, PluginSpec, ResolvedPlugin};
use tracing::info;

use crate::error::PipelineError;
use crate::process_run::run_git;

/// Resolve every plugin declared on the job, in declaration order, cloning
/// into `cache_root` as needed.
pub async fn resolve_plugins(
    specs: &[PluginSpec],
    cache_root: &Path,
    freshness: PluginFreshness,
    env: &Environment,
    on_output: &mut dyn FnMut(&[u8]),
) -> Result<Vec<ResolvedPlugin>, PipelineError> {
    let mut resolved = Vec::with_capacity(specs.len());
    for (index, spec) in specs.iter().enumerate() {
        let local_dir = cache_root.join(cache_key_dir(spec));
        ensure_cloned(spec, &local_dir, freshness, env, on_output).await?;
        resolved.push(ResolvedPlugin { spec: spec.clone(), local_dir, index });
    }
    Ok(resolved)
}

fn cache_key_dir(spec: &PluginSpec) -> String {
    let (url, git_ref) = spec.canonical_key();
    let mut hasher = DefaultHasher::new();
    (url, git_ref).hash(&mut hasher);
    format!("plugin-{:016x}", hasher.finish())
}

async fn ensure_cloned(
    spec: &PluginSpec,
    local_dir: &Path,
    freshness: PluginFreshness,
    env: &Environment,
    on_output: &mut dyn FnMut(&[u8]),
) -> Result<(), PipelineError> {
    let already_cached = local_dir.join(".git").exists();
    if already_cached && freshness == PluginFreshness::CacheAllowed {
        info!(dir = %local_dir.display(), "reusing cached plugin checkout");
        return Ok(());
    }

    let (url, git_ref) = spec.canonical_key();
    let staging_dir = local_dir.with_extension("staging");
    if staging_dir.exists() {
        tokio::fs::remove_dir_all(&staging_dir).await?;
    }
    if let Some(parent) = staging_dir.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    run_git(&["clone", &url, staging_dir.to_string_lossy().as_ref()], Path::new("."), env, on_output).await?;
    if git_ref != "HEAD" {
        run_git(&["checkout", &git_ref], &staging_dir, env, on_output).await?;
    }

    if local_dir.exists() {
        tokio::fs::remove_dir_all(local_dir).await?;
    }
    tokio::fs::rename(&staging_dir, local_dir).await?;
    Ok(())
}

pub fn cache_root(base: &Path) -> PathBuf {
    base.join("plugins")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_stable_for_the_same_source_and_ref() {
        let spec = PluginSpec {
            source_ref: "https://github.com/org/plugin.git#v1.0.0".into(),
            config: serde_json::Value::Null,
        };
        assert_eq!(cache_key_dir(&spec), cache_key_dir(&spec));
    }

    #[test]
    fn cache_key_differs_across_refs() {
        let a = PluginSpec { source_ref: "https://github.com/org/plugin#v1".into(), config: serde_json::Value::Null };
        let b = PluginSpec { source_ref: "https://github.com/org/plugin#v2".into(), config: serde_json::Value::Null };
        assert_ne!(cache_key_dir(&a), cache_key_dir(&b));
    }
}
