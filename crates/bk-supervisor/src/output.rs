// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Merges a child's stdout and stderr into a single byte-for-byte,
//! arrival-order stream ("a reader yields the child's
//! stdout+stderr merged byte-for-byte in arrival order").

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const READ_CHUNK_SIZE: usize = 8192;

/// Receiving half of a merged output stream. Each item is a contiguous slice
/// of bytes read from either stdout or stderr, in the order the reads
/// completed — not line-aligned.
pub struct OutputStream {
    rx: mpsc::Receiver<Vec<u8>>,
    stdout_task: JoinHandle<()>,
    stderr_task: JoinHandle<()>,
}

impl OutputStream {
    pub(crate) fn spawn<O, E>(stdout: O, stderr: E) -> Self
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(64);
        let stdout_task = tokio::spawn(pump(stdout, tx.clone()));
        let stderr_task = tokio::spawn(pump(stderr, tx));
        Self { rx, stdout_task, stderr_task }
    }

    /// Wrap an already-fed receiver (used by the PTY path, where a single
    /// blocking OS thread — not a tokio task — produces the chunks).
    pub(crate) fn from_receiver(rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self { rx, stdout_task: tokio::spawn(async {}), stderr_task: tokio::spawn(async {}) }
    }

    /// Await the next chunk of merged output. Returns `None` once both
    /// stdout and stderr readers have hit EOF.
    pub async fn next_chunk(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    /// Abort the background readers without waiting for EOF — used when a
    /// phase is being forcibly terminated and its pipes may never close.
    pub(crate) fn abort(&self) {
        self.stdout_task.abort();
        self.stderr_task.abort();
    }
}

async fn pump<R: AsyncRead + Unpin>(mut reader: R, tx: mpsc::Sender<Vec<u8>>) {
    let mut buf = [0u8; READ_CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };
        if tx.send(buf[..n].to_vec()).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn merges_both_readers_until_both_eof() {
        let stdout = Cursor::new(b"hello ".to_vec());
        let stderr = Cursor::new(b"world".to_vec());
        let mut stream = OutputStream::spawn(stdout, stderr);

        let mut collected = Vec::new();
        while let Some(chunk) = stream.next_chunk().await {
            collected.extend_from_slice(&chunk);
        }
        collected.sort();
        let mut expected: Vec<u8> = b"hello world".to_vec();
        expected.sort();
        assert_eq!(collected, expected);
    }

    #[tokio::test]
    async fn empty_readers_yield_no_chunks() {
        let mut stream = OutputStream::spawn(Cursor::new(Vec::new()), Cursor::new(Vec::new()));
        assert!(stream.next_chunk().await.is_none());
    }
}
