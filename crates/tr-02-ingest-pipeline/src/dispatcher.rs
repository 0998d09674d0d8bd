//! # Ingest Dispatcher
//!
//! The single task that owns the [`Pipeline`]. Connection handlers only hold
//! an [`IngestHandle`] and enqueue raw batches; all store and stats writes
//! happen on this task, in arrival order.

use crate::errors::IngestError;
use crate::pipeline::Pipeline;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default number of batches that may wait for the dispatcher.
pub const DEFAULT_INGEST_QUEUE: usize = 64;

/// Cloneable sender side of the ingest queue.
#[derive(Debug, Clone)]
pub struct IngestHandle {
    tx: mpsc::Sender<String>,
}

impl IngestHandle {
    /// Enqueue a batch, waiting while the queue is full.
    pub async fn submit(&self, batch: String) -> Result<(), IngestError> {
        self.tx.send(batch).await.map_err(|_| IngestError::Closed)
    }
}

/// Start the dispatcher.
///
/// It stops when every handle is dropped, or when `shutdown` flips to true;
/// in the latter case batches already queued are still processed.
pub fn spawn_ingest_dispatcher(
    pipeline: Pipeline,
    queue_capacity: usize,
    shutdown: watch::Receiver<bool>,
) -> (IngestHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(queue_capacity.max(1));
    let task = tokio::spawn(run(pipeline, rx, shutdown));
    (IngestHandle { tx }, task)
}

async fn run(
    pipeline: Pipeline,
    mut rx: mpsc::Receiver<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut batches = 0u64;
    loop {
        tokio::select! {
            batch = rx.recv() => match batch {
                Some(batch) => {
                    pipeline.process_batch(&batch);
                    batches += 1;
                }
                None => break,
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    rx.close();
                    while let Some(batch) = rx.recv().await {
                        pipeline.process_batch(&batch);
                        batches += 1;
                    }
                    break;
                }
            }
        }
    }

    if let Err(e) = pipeline.store().flush() {
        warn!(component = "pipeline", error = %e, "Store flush on shutdown failed");
    }
    info!(component = "pipeline", batches, "Ingest dispatcher stopped");
    debug!(component = "pipeline", stats = ?pipeline.stats().snapshot(), "Final stats");
}
