// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook discovery paths: global directories, the local checkout's
//! `.buildkite/hooks/<name>`, and each plugin's `hooks/<name>`.

use std::path::{Path, PathBuf};

use bk_core::{hook_file_name, HookScope, HookScript};

/// Where local (repository-local) hooks live relative to the checkout root.
const LOCAL_HOOKS_DIR: &str = ".buildkite/hooks";

pub struct HookLocations {
    pub global_dirs: Vec<PathBuf>,
    pub checkout_dir: PathBuf,
    pub plugin_dirs: Vec<PathBuf>,
}

impl HookLocations {
    /// All candidate scripts for `name`, in the order they should run:
    /// global directories (in configured order), then local, then each
    /// plugin in declaration order.
    pub fn candidates(&self, name: &'static str) -> Vec<HookScript> {
        let file_name = hook_file_name(name);
        let mut scripts = Vec::new();

        for dir in &self.global_dirs {
            scripts.push(HookScript { path: dir.join(&file_name), scope: HookScope::Global, name });
        }
        scripts.push(HookScript {
            path: self.checkout_dir.join(LOCAL_HOOKS_DIR).join(&file_name),
            scope: HookScope::Local,
            name,
        });
        for (index, dir) in self.plugin_dirs.iter().enumerate() {
            scripts.push(HookScript {
                path: dir.join("hooks").join(&file_name),
                scope: HookScope::Plugin { plugin_index: index },
                name,
            });
        }
        scripts
    }

    /// Existing scripts only, in run order.
    pub fn existing(&self, name: &'static str) -> Vec<HookScript> {
        self.candidates(name).into_iter().filter(|h| h.path.is_file()).collect()
    }
}

pub fn local_hooks_dir(checkout_dir: &Path) -> PathBuf {
    checkout_dir.join(LOCAL_HOOKS_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_are_ordered_global_then_local_then_plugins() {
        let locations = HookLocations {
            global_dirs: vec![PathBuf::from("/global")],
            checkout_dir: PathBuf::from("/checkout"),
            plugin_dirs: vec![PathBuf::from("/plugins/a"), PathBuf::from("/plugins/b")],
        };
        let scripts = locations.candidates("pre-command");
        assert_eq!(scripts.len(), 4);
        assert_eq!(scripts[0].scope, HookScope::Global);
        assert_eq!(scripts[1].scope, HookScope::Local);
        assert_eq!(scripts[2].scope, HookScope::Plugin { plugin_index: 0 });
        assert_eq!(scripts[3].scope, HookScope::Plugin { plugin_index: 1 });
    }

    #[test]
    fn local_hook_path_is_under_dot_buildkite_hooks() {
        let locations = HookLocations {
            global_dirs: vec![],
            checkout_dir: PathBuf::from("/checkout"),
            plugin_dirs: vec![],
        };
        let scripts = locations.candidates("checkout");
        assert_eq!(scripts[0].path, PathBuf::from("/checkout/.buildkite/hooks/checkout"));
    }
}
