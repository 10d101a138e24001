//! Output channel - bounded, closable hand-off between the buffers and the output runners

use async_channel::{bounded, Receiver, Sender};
use contracts::Batch;
use tracing::warn;

/// Create an output channel holding at most `capacity` ready batches
pub fn output_channel(capacity: usize) -> (OutputSender, OutputReceiver) {
    let (tx, rx) = bounded(capacity.max(1));
    (OutputSender { tx }, OutputReceiver { rx })
}

/// Producer side, owned by the daemon controller
#[derive(Debug, Clone)]
pub struct OutputSender {
    tx: Sender<Batch>,
}

impl OutputSender {
    /// Enqueue a ready batch
    ///
    /// Suspends only while the channel is full. Returns false (batch lost) if
    /// the channel was closed or every receiver is gone.
    pub async fn write(&self, batch: Batch) -> bool {
        let size = batch.len();
        match self.tx.send(batch).await {
            Ok(()) => true,
            Err(_) => {
                warn!(batch_size = size, "output channel closed, batch dropped");
                false
            }
        }
    }

    /// Close the channel; queued batches are still delivered
    pub fn close(&self) -> bool {
        self.tx.close()
    }

    /// Whether the channel was closed
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Number of queued batches
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    /// Whether no batch is queued
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

/// Consumer side, cloned into every output runner
#[derive(Debug, Clone)]
pub struct OutputReceiver {
    rx: Receiver<Batch>,
}

impl OutputReceiver {
    /// Dequeue the next batch
    ///
    /// Returns None once the channel is closed and drained.
    pub async fn read(&self) -> Option<Batch> {
        self.rx.recv().await.ok()
    }
}
