//! MetricRecorder trait - "record a number under a name"

use std::collections::BTreeMap;

/// Metric dimensions (label name -> label value)
pub type MetricDimensions = BTreeMap<String, String>;

/// Unit of a recorded value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricUnit {
    /// Summed count
    Count,
    /// Averaged count
    CountAverage,
    /// Averaged milliseconds
    MillisecondsAverage,
}

/// A single recorded value
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDatum {
    pub name: String,
    pub dimensions: MetricDimensions,
    pub value: f64,
    pub unit: MetricUnit,
}

/// Metrics capability
///
/// Fire-and-forget: implementations must never block or fail the caller.
pub trait MetricRecorder: Send + Sync {
    fn record(&self, datum: MetricDatum);
}

/// Recorder that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetricRecorder;

impl MetricRecorder for NoopMetricRecorder {
    fn record(&self, _datum: MetricDatum) {}
}
