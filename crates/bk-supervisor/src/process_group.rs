// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! POSIX process-group plumbing: the child is placed in its own process
//! group so Interrupt/Terminate can reach its whole descendant tree via
//! `-pgid`.

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

#[cfg(unix)]
pub(crate) fn configure_new_group(cmd: &mut tokio::process::Command) {
    use std::os::unix::process::CommandExt;
    // pgid 0 means "use this child's own pid as its process-group id".
    cmd.process_group(0);
}

#[cfg(not(unix))]
pub(crate) fn configure_new_group(_cmd: &mut tokio::process::Command) {}

/// Send `signal` to every process in the group rooted at `pgid`.
pub(crate) fn signal_group(pgid: i32, sig: Signal) -> nix::Result<()> {
    signal::kill(Pid::from_raw(-pgid), sig)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signalling_a_group_with_no_such_pgid_reports_esrch() {
        // A pgid far outside any plausible live range: exercises the error
        // path without depending on process-table state.
        let err = signal_group(i32::MAX / 2, Signal::SIGTERM).unwrap_err();
        assert_eq!(err, nix::Error::ESRCH);
    }
}
