// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio::process::Child;

/// Ensures a spawned child is killed if the owning future is dropped before
/// the child has exited — prevents orphaned processes when a phase's task is
/// aborted out from under the supervisor (e.g. the job runner cancels the
/// pipeline mid-phase).
pub(crate) struct KillGuard {
    child: Option<Child>,
}

impl KillGuard {
    pub(crate) fn new(child: Child) -> Self {
        Self { child: Some(child) }
    }

    pub(crate) fn as_mut(&mut self) -> &mut Child {
        self.child.as_mut().expect("KillGuard polled after disarm")
    }

    /// Stop signalling the child on drop, once its exit has been observed.
    pub(crate) fn disarm(&mut self) {
        self.child = None;
    }
}

impl Drop for KillGuard {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
    }
}
