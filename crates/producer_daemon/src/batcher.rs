//! Batcher - groups carrier messages into fixed-size batches.

use std::collections::VecDeque;

use contracts::{Batch, Message};

/// Pending batch buffer
///
/// Not synchronized; the daemon mutates it under its state lock.
#[derive(Debug)]
pub(crate) struct Batcher {
    size: usize,
    pending: VecDeque<Message>,
}

impl Batcher {
    pub(crate) fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            pending: VecDeque::with_capacity(size),
        }
    }

    pub(crate) fn append(&mut self, carriers: Vec<Message>) {
        self.pending.extend(carriers);
    }

    /// A full batch is buffered
    pub(crate) fn is_ready(&self) -> bool {
        self.pending.len() >= self.size
    }

    /// Copy of the next batch: up to `size` messages from the front
    ///
    /// The messages stay buffered until [`Batcher::consume`] removes them, so
    /// a send abandoned midway loses nothing.
    pub(crate) fn peek_batch(&self) -> Option<Batch> {
        if self.pending.is_empty() {
            return None;
        }
        let n = self.pending.len().min(self.size);
        Some(self.pending.range(..n).cloned().collect())
    }

    /// Drop `n` messages from the front once they were handed off
    pub(crate) fn consume(&mut self, n: usize) {
        let n = n.min(self.pending.len());
        self.pending.drain(..n);
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}
