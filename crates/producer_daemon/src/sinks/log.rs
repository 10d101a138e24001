//! LogSink - logs batch summaries via tracing

use contracts::{Message, OutputSink, SinkError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Sink that logs batch summaries for debugging
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_batch_summary(&self, batch: &[Message]) {
        let aggregates = batch.iter().filter(|m| m.is_aggregate()).count();
        let bytes: usize = batch.iter().map(Message::len).sum();

        info!(
            sink = %self.name,
            messages = batch.len(),
            aggregates,
            bytes,
            "batch received"
        );
    }
}

impl OutputSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, _cancel, batch),
        fields(sink = %self.name, batch_size = batch.len())
    )]
    async fn write(&self, _cancel: &CancellationToken, batch: &[Message]) -> Result<(), SinkError> {
        self.log_batch_summary(batch);
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&self) -> Result<(), SinkError> {
        debug!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}
