//! Aggregator - folds raw messages into aggregate carrier messages.

use std::collections::VecDeque;
use std::sync::Arc;

use contracts::{AggregateFolder, Attributes, DaemonError, Message, ATTRIBUTE_AGGREGATE};
use tracing::error;

use crate::metrics::{DaemonStats, MetricWriter};

/// Pending aggregate buffer plus the folding policy
///
/// Not synchronized; the daemon mutates it under its state lock.
pub(crate) struct Aggregator {
    size: usize,
    pending: VecDeque<Message>,
    attributes: Attributes,
    folder: Arc<dyn AggregateFolder>,
    metrics: MetricWriter,
    stats: Arc<DaemonStats>,
}

impl Aggregator {
    pub(crate) fn new(
        size: usize,
        message_attributes: &Attributes,
        folder: Arc<dyn AggregateFolder>,
        metrics: MetricWriter,
        stats: Arc<DaemonStats>,
    ) -> Self {
        let mut attributes = message_attributes.clone();
        attributes.insert(ATTRIBUTE_AGGREGATE.to_string(), serde_json::Value::Bool(true));

        Self {
            size,
            pending: VecDeque::with_capacity(size),
            attributes,
            folder,
            metrics,
            stats,
        }
    }

    /// Buffered raw messages
    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    /// Append raw messages and fold every complete group
    ///
    /// Pass-through when aggregation is disabled. On a fold failure the group
    /// being folded is dropped and the error is returned; groups folded before
    /// the failure are lost with the aborted write as well.
    pub(crate) fn apply(&mut self, messages: Vec<Message>) -> Result<Vec<Message>, DaemonError> {
        if self.size <= 1 {
            return Ok(messages);
        }

        self.pending.extend(messages);

        let mut carriers = Vec::with_capacity(self.pending.len() / self.size);
        while self.pending.len() >= self.size {
            let group: Vec<Message> = self.pending.drain(..self.size).collect();
            match self.fold(group) {
                Ok(carrier) => carriers.push(carrier),
                Err(e) => {
                    self.stats.add_messages_dropped(carriers.len() * self.size);
                    return Err(e);
                }
            }
        }

        Ok(carriers)
    }

    /// Forced flush: fold whatever remains, even below threshold
    pub(crate) fn flush(&mut self) -> Result<Option<Message>, DaemonError> {
        if self.pending.is_empty() {
            return Ok(None);
        }

        let group: Vec<Message> = self.pending.drain(..).collect();
        self.fold(group).map(Some)
    }

    fn fold(&self, group: Vec<Message>) -> Result<Message, DaemonError> {
        self.metrics.aggregate_size(group.len());

        match self.folder.fold(&group, &self.attributes) {
            Ok(message) => {
                self.stats.inc_aggregates_folded();
                Ok(message)
            }
            Err(e) => {
                self.stats.add_messages_dropped(group.len());
                error!(dropped = group.len(), error = %e, "can not fold aggregate, messages dropped");
                Err(DaemonError::from(e))
            }
        }
    }
}
