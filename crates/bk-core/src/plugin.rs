// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugins: named, versioned external bundles that contribute hooks.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A `{sourceRef: config}` entry as delivered in the job's `PLUGINS` JSON
/// array. `source_ref` is a repository URL plus an optional
/// `#ref` suffix; `config` is an opaque tree the core never interprets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub source_ref: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

impl PluginSpec {
    /// Split `source_ref` into (canonical URL, ref), used as the plugin
    /// cache key ("cache key is the pair (canonicalised source
    /// URL, ref)").
    pub fn canonical_key(&self) -> (String, String) {
        match self.source_ref.rsplit_once('#') {
            Some((url, git_ref)) => (canonicalize_url(url), git_ref.to_string()),
            None => (canonicalize_url(&self.source_ref), "HEAD".to_string()),
        }
    }
}

fn canonicalize_url(url: &str) -> String {
    url.trim_end_matches('/').trim_end_matches(".git").to_string()
}

/// A plugin materialized into a local directory, with the hooks it's known
/// to provide discovered on disk.
#[derive(Debug, Clone)]
pub struct ResolvedPlugin {
    pub spec: PluginSpec,
    pub local_dir: PathBuf,
    /// Declaration order among this job's plugins; hooks run in this order.
    pub index: usize,
}

impl ResolvedPlugin {
    pub fn hook_dir(&self) -> PathBuf {
        self.local_dir.join("hooks")
    }
}

/// Whether a plugin clone should be reused if already cached, or forced
/// fresh every job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PluginFreshness {
    #[default]
    CacheAllowed,
    AlwaysFresh,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_key_splits_ref_suffix() {
        let spec = PluginSpec {
            source_ref: "https://github.com/org/plugin.git#v1.2.0".into(),
            config: serde_json::Value::Null,
        };
        let (url, git_ref) = spec.canonical_key();
        assert_eq!(url, "https://github.com/org/plugin");
        assert_eq!(git_ref, "v1.2.0");
    }

    #[test]
    fn canonical_key_defaults_ref_to_head() {
        let spec = PluginSpec {
            source_ref: "https://github.com/org/plugin".into(),
            config: serde_json::Value::Null,
        };
        let (_, git_ref) = spec.canonical_key();
        assert_eq!(git_ref, "HEAD");
    }

    #[test]
    fn hook_dir_is_local_dir_slash_hooks() {
        let resolved = ResolvedPlugin {
            spec: PluginSpec { source_ref: "x".into(), config: serde_json::Value::Null },
            local_dir: PathBuf::from("/cache/plugin-abc"),
            index: 0,
        };
        assert_eq!(resolved.hook_dir(), PathBuf::from("/cache/plugin-abc/hooks"));
    }
}
