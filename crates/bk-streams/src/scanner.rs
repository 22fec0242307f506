// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Splits an arbitrary byte stream into logical lines.
//!
//! Robust to lines of unbounded length: unlike `AsyncBufReadExt::lines`,
//! this never assumes the line fits in one internal buffer, and it never
//! assumes the bytes are valid UTF-8 (ANSI-heavy build output routinely
//! isn't).

use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK_SIZE: usize = 8192;

/// A logical line, with whether it ended in `\n` (false only for a final,
/// unterminated line at EOF — "preserves the line's trailing
/// newline decision").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedLine {
    pub bytes: Vec<u8>,
    pub terminated: bool,
}

pub struct Scanner {
    carry: Vec<u8>,
}

impl Scanner {
    pub fn new() -> Self {
        Self { carry: Vec::new() }
    }

    /// Feed one chunk of freshly-read bytes; returns every complete line
    /// found (carrying any trailing partial line internally until the next
    /// feed or `finish`).
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ScannedLine> {
        self.carry.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(rel_nl) = memchr(b'\n', &self.carry[start..]) {
            let end = start + rel_nl;
            lines.push(ScannedLine { bytes: self.carry[start..end].to_vec(), terminated: true });
            start = end + 1;
        }
        self.carry.drain(..start);
        lines
    }

    /// Call at EOF: emits the trailing unterminated line, if any.
    pub fn finish(&mut self) -> Option<ScannedLine> {
        if self.carry.is_empty() {
            None
        } else {
            Some(ScannedLine { bytes: std::mem::take(&mut self.carry), terminated: false })
        }
    }

    /// Drive a full async reader to completion, invoking `on_line` for
    /// every line (including the final unterminated one, if any).
    pub async fn scan<R, F>(mut reader: R, mut on_line: F) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
        F: FnMut(ScannedLine),
    {
        let mut scanner = Scanner::new();
        let mut buf = [0u8; READ_CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            for line in scanner.feed(&buf[..n]) {
                on_line(line);
            }
        }
        if let Some(line) = scanner.finish() {
            on_line(line);
        }
        Ok(())
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

fn memchr(needle: u8, haystack: &[u8]) -> Option<usize> {
    haystack.iter().position(|&b| b == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_complete_lines() {
        let mut scanner = Scanner::new();
        let lines = scanner.feed(b"one\ntwo\nthree\n");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].bytes, b"one");
        assert!(lines[2].terminated);
    }

    #[test]
    fn holds_partial_line_across_feeds() {
        let mut scanner = Scanner::new();
        assert!(scanner.feed(b"par").is_empty());
        let lines = scanner.feed(b"tial\n");
        assert_eq!(lines[0].bytes, b"partial");
    }

    #[test]
    fn finish_emits_unterminated_tail() {
        let mut scanner = Scanner::new();
        scanner.feed(b"no newline");
        let tail = scanner.finish().unwrap();
        assert_eq!(tail.bytes, b"no newline");
        assert!(!tail.terminated);
    }

    #[test]
    fn a_line_longer_than_one_chunk_is_reassembled() {
        let mut scanner = Scanner::new();
        let long_segment = vec![b'x'; READ_CHUNK_SIZE * 3];
        assert!(scanner.feed(&long_segment).is_empty());
        let lines = scanner.feed(b"\n");
        assert_eq!(lines[0].bytes.len(), long_segment.len());
    }

    #[tokio::test]
    async fn scan_drives_an_async_reader_to_eof() {
        let reader = std::io::Cursor::new(b"a\nb\nc".to_vec());
        let mut seen = Vec::new();
        Scanner::scan(reader, |line| seen.push(line.bytes)).await.unwrap();
        assert_eq!(seen, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }
}
