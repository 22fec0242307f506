// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bk_core::{ChunkPartitioner, LogChunk};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::uploader::ChunkUploader;

pub struct LogStreamerConfig {
    /// Size of the fixed upload worker pool ("default 3").
    pub worker_count: usize,
    /// Bound on the queue workers drain from ("bounded queue
    /// ~1024") — the only backpressure the core exposes to the subprocess.
    pub queue_capacity: usize,
    pub max_chunk_size: usize,
}

impl Default for LogStreamerConfig {
    fn default() -> Self {
        Self {
            worker_count: 3,
            queue_capacity: 1024,
            max_chunk_size: bk_core::config::DEFAULT_CHUNK_SIZE,
        }
    }
}

/// The Log Streamer: accepts appended job output, partitions
/// it into chunks, and hands them to a bounded pool of upload workers.
pub struct LogStreamer {
    partitioner: ChunkPartitioner,
    tx: mpsc::Sender<LogChunk>,
    workers: Vec<JoinHandle<()>>,
    failed_chunks: Arc<AtomicU64>,
}

impl LogStreamer {
    pub fn start(config: LogStreamerConfig, uploader: Arc<dyn ChunkUploader>) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));
        let failed_chunks = Arc::new(AtomicU64::new(0));

        let workers = (0..config.worker_count)
            .map(|worker_id| {
                let rx = Arc::clone(&rx);
                let uploader = Arc::clone(&uploader);
                let failed_chunks = Arc::clone(&failed_chunks);
                tokio::spawn(async move {
                    loop {
                        let chunk = {
                            let mut rx = rx.lock().await;
                            rx.recv().await
                        };
                        let Some(chunk) = chunk else { break };
                        let order = chunk.order;
                        if let Err(e) = uploader.upload(chunk).await {
                            warn!(worker_id, order, error = %e, "chunk upload permanently failed");
                            failed_chunks.fetch_add(1, Ordering::Relaxed);
                        } else {
                            debug!(worker_id, order, "chunk uploaded");
                        }
                    }
                })
            })
            .collect();

        Self {
            partitioner: ChunkPartitioner::new(config.max_chunk_size),
            tx,
            workers,
            failed_chunks,
        }
    }

    /// Partition and enqueue newly-appended bytes. Blocks (
    /// "backpressure") when the queue is full.
    pub async fn append(&mut self, bytes: &[u8]) {
        for chunk in self.partitioner.partition(bytes) {
            // An unbounded number of chunks from one append call must all
            // enqueue before we return, or a later call could interleave
            // ahead of an earlier one's chunks.
            if self.tx.send(chunk).await.is_err() {
                warn!("log streamer queue closed while appending; dropping remaining chunks");
                break;
            }
        }
    }

    /// Wait for all queued chunks to drain, then shut workers down.
    pub async fn stop(self) -> u64 {
        drop(self.tx);
        for worker in self.workers {
            let _ = worker.await;
        }
        self.failed_chunks.load(Ordering::Relaxed)
    }

    /// Count of chunks that exhausted their retry budget so far.
    pub fn failed_chunks(&self) -> u64 {
        self.failed_chunks.load(Ordering::Relaxed)
    }
}
