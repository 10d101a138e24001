//! Daemon metrics for observability
//!
//! Atomic counters for local inspection plus emission through the injected
//! [`MetricRecorder`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{MetricDatum, MetricDimensions, MetricRecorder, MetricUnit};

pub const METRIC_MESSAGE_COUNT: &str = "MessageCount";
pub const METRIC_BATCH_SIZE: &str = "BatchSize";
pub const METRIC_AGGREGATE_SIZE: &str = "AggregateSize";
pub const METRIC_IDLE_DURATION: &str = "IdleDuration";

/// Dimension carrying the daemon name
pub const DIMENSION_DAEMON: &str = "ProducerDaemon";

/// Counters for a single daemon
#[derive(Debug, Default)]
pub struct DaemonStats {
    /// Raw messages accepted by `write`
    messages_written: AtomicU64,
    /// Aggregates produced by the folding capability
    aggregates_folded: AtomicU64,
    /// Raw messages lost to fold failures
    messages_dropped: AtomicU64,
    /// Batches pushed onto the output channel
    batches_dispatched: AtomicU64,
    /// Batches the sink accepted
    batches_written: AtomicU64,
    /// Batches the sink rejected
    batches_failed: AtomicU64,
}

impl DaemonStats {
    /// Create new stats instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages_written(&self) -> u64 {
        self.messages_written.load(Ordering::Relaxed)
    }

    pub fn aggregates_folded(&self) -> u64 {
        self.aggregates_folded.load(Ordering::Relaxed)
    }

    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }

    pub fn batches_dispatched(&self) -> u64 {
        self.batches_dispatched.load(Ordering::Relaxed)
    }

    pub fn batches_written(&self) -> u64 {
        self.batches_written.load(Ordering::Relaxed)
    }

    pub fn batches_failed(&self) -> u64 {
        self.batches_failed.load(Ordering::Relaxed)
    }

    pub(crate) fn add_messages_written(&self, count: usize) {
        self.messages_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn inc_aggregates_folded(&self) {
        self.aggregates_folded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_messages_dropped(&self, count: usize) {
        self.messages_dropped
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn inc_batches_dispatched(&self) {
        self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_batches_written(&self) {
        self.batches_written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_batches_failed(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_written: self.messages_written(),
            aggregates_folded: self.aggregates_folded(),
            messages_dropped: self.messages_dropped(),
            batches_dispatched: self.batches_dispatched(),
            batches_written: self.batches_written(),
            batches_failed: self.batches_failed(),
        }
    }
}

/// Snapshot of daemon counters (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub messages_written: u64,
    pub aggregates_folded: u64,
    pub messages_dropped: u64,
    pub batches_dispatched: u64,
    pub batches_written: u64,
    pub batches_failed: u64,
}

/// Emits the daemon's four metrics through the recorder
#[derive(Clone)]
pub(crate) struct MetricWriter {
    recorder: Arc<dyn MetricRecorder>,
    dimensions: MetricDimensions,
    interval: Duration,
}

impl MetricWriter {
    pub(crate) fn new(name: &str, recorder: Arc<dyn MetricRecorder>, interval: Duration) -> Self {
        let mut dimensions = MetricDimensions::new();
        dimensions.insert(DIMENSION_DAEMON.to_string(), name.to_string());
        Self {
            recorder,
            dimensions,
            interval,
        }
    }

    pub(crate) fn message_count(&self, count: usize) {
        self.write(METRIC_MESSAGE_COUNT, count as f64, MetricUnit::Count);
    }

    pub(crate) fn batch_size(&self, size: usize) {
        self.write(METRIC_BATCH_SIZE, size as f64, MetricUnit::CountAverage);
    }

    pub(crate) fn aggregate_size(&self, size: usize) {
        self.write(METRIC_AGGREGATE_SIZE, size as f64, MetricUnit::CountAverage);
    }

    /// Idle time is clamped to one flush interval so a cold start does not skew the average
    pub(crate) fn idle_duration(&self, idle: Duration) {
        let idle = idle.min(self.interval);
        self.write(
            METRIC_IDLE_DURATION,
            idle.as_millis() as f64,
            MetricUnit::MillisecondsAverage,
        );
    }

    fn write(&self, name: &str, value: f64, unit: MetricUnit) {
        self.recorder.record(MetricDatum {
            name: name.to_string(),
            dimensions: self.dimensions.clone(),
            value,
            unit,
        });
    }
}
