/// Concurrent batch prefetching.
///
/// Inference and training consumers take batches faster than a single thread
/// can materialize them from a large archive. The prefetcher runs a small
/// worker pool over a read-only `Arc<SampleArchive>`: workers claim batch
/// indices from a shared atomic counter, materialize each batch, and push it
/// through a bounded channel. Queue depth bounds memory; workers block once
/// the consumer falls behind.
///
/// With more than one worker, batches can arrive out of index order — each
/// item carries its batch index so order-sensitive consumers can reassemble.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::model::ForecastError;
use crate::pipeline::archive::SampleArchive;
use crate::pipeline::window::SampleSet;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PrefetchConfig {
    /// Samples per batch; the final batch may be smaller.
    pub batch_size: usize,
    /// Maximum finished batches buffered ahead of the consumer.
    pub queue_depth: usize,
    /// Worker threads materializing batches.
    pub workers: usize,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            batch_size: 16,
            queue_depth: 4,
            workers: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Prefetcher
// ---------------------------------------------------------------------------

/// A running prefetch pool. Iterate to drain; dropping it stops the pool
/// (workers exit on the closed channel at their next send).
#[derive(Debug)]
pub struct BatchPrefetcher {
    rx: Receiver<(usize, SampleSet)>,
    handles: Vec<JoinHandle<()>>,
}

impl BatchPrefetcher {
    /// Starts workers over `archive`. The archive is shared read-only;
    /// workers hold no other state.
    pub fn spawn(archive: Arc<SampleArchive>, config: PrefetchConfig) -> Result<Self, ForecastError> {
        if config.batch_size == 0 {
            return Err(ForecastError::EmptyInput("prefetch batch size"));
        }
        if config.queue_depth == 0 {
            return Err(ForecastError::EmptyInput("prefetch queue depth"));
        }
        if config.workers == 0 {
            return Err(ForecastError::EmptyInput("prefetch workers"));
        }

        let n_batches = archive.len().div_ceil(config.batch_size);
        let next_batch = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = sync_channel(config.queue_depth);

        let mut handles = Vec::with_capacity(config.workers);
        for _ in 0..config.workers {
            let archive = Arc::clone(&archive);
            let next_batch = Arc::clone(&next_batch);
            let tx: SyncSender<(usize, SampleSet)> = tx.clone();
            let batch_size = config.batch_size;
            handles.push(std::thread::spawn(move || {
                loop {
                    let index = next_batch.fetch_add(1, Ordering::Relaxed);
                    if index >= n_batches {
                        break;
                    }
                    let start = index * batch_size;
                    let count = batch_size.min(archive.len() - start);
                    let batch = match archive.slice_batch(start, count) {
                        Ok(b) => b,
                        // The archive was validated on load; a slice failure
                        // here means the claimed index math is wrong, and
                        // the consumer will observe the missing batch.
                        Err(_) => break,
                    };
                    if tx.send((index, batch)).is_err() {
                        break; // consumer dropped the receiver
                    }
                }
            }));
        }
        drop(tx);

        Ok(Self { rx, handles })
    }

    /// Blocks for the next batch; `None` once all workers have finished.
    pub fn next_batch(&self) -> Option<(usize, SampleSet)> {
        self.rx.recv().ok()
    }

    /// Waits for all workers to exit. Called automatically on drop.
    pub fn join(&mut self) {
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Iterator for BatchPrefetcher {
    type Item = (usize, SampleSet);

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch()
    }
}

impl Drop for BatchPrefetcher {
    fn drop(&mut self) {
        // Close our end so blocked workers unblock, then reap them.
        let (dead_tx, dead_rx) = sync_channel(1);
        drop(dead_tx);
        let _ = std::mem::replace(&mut self.rx, dead_rx);
        self.join();
    }
}
