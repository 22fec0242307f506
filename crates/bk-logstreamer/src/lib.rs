// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bk-logstreamer: the Log Streamer — partitions appended
//! job output into size-bounded, sequenced chunks and drains them through a
//! fixed pool of upload workers with at-least-once semantics.

mod streamer;
mod uploader;

pub use streamer::{LogStreamer, LogStreamerConfig};
pub use uploader::{ChunkUploader, UploadError};
