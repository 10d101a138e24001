//! Shared sinks and helpers for the end-to-end tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use contracts::{Batch, DaemonSettings, Message, OutputSink, SinkError};
use producer_daemon::unpack_aggregate;
use tokio_util::sync::CancellationToken;

/// Records every batch it is handed
#[derive(Clone, Default)]
pub struct CollectSink {
    batches: Arc<Mutex<Vec<Batch>>>,
}

impl CollectSink {
    pub fn batches(&self) -> Vec<Batch> {
        self.batches.lock().unwrap().clone()
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }

    /// Every raw message delivered, aggregates expanded, in delivery order
    pub fn unpacked(&self) -> Vec<Message> {
        self.batches()
            .iter()
            .flatten()
            .flat_map(|carrier| unpack_aggregate(carrier).unwrap())
            .collect()
    }

    /// Raw message bodies as strings, in delivery order
    pub fn bodies(&self) -> Vec<String> {
        self.unpacked()
            .iter()
            .map(|m| String::from_utf8(m.body.to_vec()).unwrap())
            .collect()
    }
}

impl OutputSink for CollectSink {
    fn name(&self) -> &str {
        "collect"
    }

    async fn write(&self, _cancel: &CancellationToken, batch: &[Message]) -> Result<(), SinkError> {
        self.batches.lock().unwrap().push(batch.to_vec());
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Rejects the first `failures` batches, then behaves like [`CollectSink`]
#[derive(Clone, Default)]
pub struct FlakySink {
    pub inner: CollectSink,
    failures: Arc<Mutex<usize>>,
}

impl FlakySink {
    pub fn new(failures: usize) -> Self {
        Self {
            inner: CollectSink::default(),
            failures: Arc::new(Mutex::new(failures)),
        }
    }
}

impl OutputSink for FlakySink {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn write(&self, cancel: &CancellationToken, batch: &[Message]) -> Result<(), SinkError> {
        {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(SinkError::write("flaky", "downstream unavailable"));
            }
        }
        self.inner.write(cancel, batch).await
    }

    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Panics on every write
pub struct PanicSink;

impl OutputSink for PanicSink {
    fn name(&self) -> &str {
        "panic"
    }

    async fn write(&self, _cancel: &CancellationToken, _batch: &[Message]) -> Result<(), SinkError> {
        panic!("sink exploded")
    }

    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

pub fn settings(batch_size: usize, aggregation_size: usize, runner_count: usize) -> DaemonSettings {
    DaemonSettings {
        interval_ms: 60_000,
        buffer_size: 4,
        runner_count,
        batch_size,
        aggregation_size,
        ..DaemonSettings::default()
    }
}

pub fn numbered(range: std::ops::Range<usize>) -> Vec<Message> {
    range.map(|i| Message::new(i.to_string())).collect()
}

/// Poll `condition` every millisecond for up to two seconds
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..2000 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    condition()
}
