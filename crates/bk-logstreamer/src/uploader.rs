// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use bk_core::LogChunk;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("chunk upload failed: {0}")]
pub struct UploadError(pub String);

/// Caller-provided upload function ("worker contract"). The
/// upload function is expected to perform its own retry on transient
/// transport failure; an `Err` here is a *permanent* failure for this
/// chunk and only increments the failed-chunk counter.
#[async_trait::async_trait]
pub trait ChunkUploader: Send + Sync {
    async fn upload(&self, chunk: LogChunk) -> Result<(), UploadError>;
}
