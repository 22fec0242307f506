// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pseudo-terminal support. POSIX-only ("PTY is POSIX-only; on
//! Windows the supervisor always uses pipes").

use std::os::fd::OwnedFd;
use std::process::Stdio;

use nix::pty::{openpty, OpenptyResult};
use tokio::sync::mpsc;

use crate::error::SupervisorError;

/// A PTY pair whose slave end has been wired into a child's stdio and whose
/// master end is read from a blocking task (the master fd has no tokio
/// reactor integration of its own, so we shuttle bytes across a channel
/// rather than juggle manual `AsyncFd` registration for a leaf crate).
pub(crate) struct Pty {
    master: OwnedFd,
}

impl Pty {
    pub(crate) fn open() -> Result<(Self, [Stdio; 3]), SupervisorError> {
        let OpenptyResult { master, slave } =
            openpty(None, None).map_err(SupervisorError::Signal)?;

        let stdin = Stdio::from(slave.try_clone().map_err(SupervisorError::Io)?);
        let stdout = Stdio::from(slave.try_clone().map_err(SupervisorError::Io)?);
        let stderr = Stdio::from(slave);

        Ok((Self { master }, [stdin, stdout, stderr]))
    }

    /// Spawn a blocking reader over the PTY master, forwarding chunks to
    /// `tx` the same way `output::pump` forwards pipe reads.
    pub(crate) fn spawn_reader(self, tx: mpsc::Sender<Vec<u8>>) {
        std::thread::spawn(move || {
            use std::io::Read;
            let mut file = std::fs::File::from(self.master);
            let mut buf = [0u8; 8192];
            loop {
                match file.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.blocking_send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    // The kernel returns EIO once the last slave fd closes —
                    // that is PTY-speak for "peer closed", not a real error
                    // ("I/O errors on the PTY at close time
                    // that represent 'peer closed' must be swallowed").
                    Err(e) if e.raw_os_error() == Some(libc_eio()) => break,
                    Err(_) => break,
                }
            }
        });
    }
}

fn libc_eio() -> i32 {
    // EIO is 5 on every POSIX target nix/this crate supports; avoided a
    // direct libc dependency for a single constant.
    5
}
