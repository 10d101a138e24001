//! Output runner - drains the output channel into the sink

use std::sync::Arc;

use contracts::{DaemonError, OutputSink};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use crate::metrics::{DaemonStats, MetricWriter};
use crate::output_channel::OutputReceiver;

/// Everything a runner needs, cloned once per runner
pub(crate) struct OutputRunner<S> {
    pub(crate) daemon: String,
    pub(crate) sink: Arc<S>,
    pub(crate) receiver: OutputReceiver,
    pub(crate) cancel: CancellationToken,
    pub(crate) metrics: MetricWriter,
    pub(crate) stats: Arc<DaemonStats>,
}

impl<S> OutputRunner<S>
where
    S: OutputSink + Sync,
{
    /// Loop until the output channel is closed and drained
    ///
    /// Sink errors are logged and the batch is lost; the runner keeps going.
    #[instrument(name = "output_runner", skip(self), fields(daemon = %self.daemon))]
    pub(crate) async fn run(self, id: usize) -> Result<(), DaemonError> {
        debug!("output runner started");

        loop {
            let waiting = Instant::now();
            let Some(batch) = self.receiver.read().await else {
                break;
            };
            let idle = waiting.elapsed();

            match self.sink.write(&self.cancel, &batch).await {
                Ok(()) => self.stats.inc_batches_written(),
                Err(e) if e.is_canceled() => {
                    self.stats.inc_batches_failed();
                    warn!(
                        sink = self.sink.name(),
                        batch_size = batch.len(),
                        "can not write messages to output because of canceled context"
                    );
                }
                Err(e) => {
                    self.stats.inc_batches_failed();
                    error!(
                        sink = self.sink.name(),
                        batch_size = batch.len(),
                        error = %e,
                        "can not write messages to output"
                    );
                }
            }

            self.metrics.batch_size(batch.len());
            self.metrics.idle_duration(idle);
        }

        debug!("output runner stopped");
        Ok(())
    }
}
