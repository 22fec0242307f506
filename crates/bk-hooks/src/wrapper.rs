// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generates the env-diff wrapper script described

use std::path::Path;

/// Render the wrapper script body. `before_env`/`after_env` must be unique
/// per invocation ("write dumps to unique temporary paths").
pub(crate) fn render(hook_path: &Path, before_env: &Path, after_env: &Path) -> String {
    format!(
        "#!/bin/sh\n\
        set -a\n\
        env > \"{before}\"\n\
        . \"{hook}\"\n\
        LAST_HOOK_EXIT_STATUS=$?\n\
        export LAST_HOOK_EXIT_STATUS\n\
        env > \"{after}\"\n\
        exit \"$LAST_HOOK_EXIT_STATUS\"\n",
        before = before_env.display(),
        hook = hook_path.display(),
        after = after_env.display(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn wrapper_dumps_env_before_and_after_and_propagates_exit_status() {
        let script = render(
            &PathBuf::from("/hooks/pre-command"),
            &PathBuf::from("/tmp/before.env"),
            &PathBuf::from("/tmp/after.env"),
        );
        assert!(script.contains("env > \"/tmp/before.env\""));
        assert!(script.contains(". \"/hooks/pre-command\""));
        assert!(script.contains("LAST_HOOK_EXIT_STATUS=$?"));
        assert!(script.contains("env > \"/tmp/after.env\""));
        assert!(script.ends_with("exit \"$LAST_HOOK_EXIT_STATUS\"\n"));
    }
}
