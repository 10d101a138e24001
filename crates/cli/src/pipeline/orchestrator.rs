//! Pipeline orchestrator - wires input, producer daemons and sinks.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use contracts::{Message, MetricRecorder, OutputSink, ProducerConfig, ProducerEntry};
use observability::{CompositeRecorder, FacadeMetricRecorder, SummaryRecorder};
use producer_daemon::{create_sink, AnySink, DaemonRegistry, ProducerDaemon};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::CliError;

use super::stats::{DaemonReport, PipelineStats};

/// Attribute stamped on every message with its 1-based input line number
pub const ATTRIBUTE_LINE: &str = "line";

type Daemon = Arc<ProducerDaemon<AnySink>>;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated producer configuration
    pub producer_config: ProducerConfig,
    /// Only run this producer (None = all)
    pub producer: Option<String>,
    /// Input file (None = stdin)
    pub input: Option<PathBuf>,
    /// Lines handed to one `write` call
    pub lines_per_write: usize,
    /// Stop feeding input after this long (None = until EOF)
    pub timeout: Option<Duration>,
    /// Forward daemon metrics to the installed `metrics` recorder
    pub export_metrics: bool,
}

/// Progress of the input feed
#[derive(Debug, Default)]
struct FeedProgress {
    lines_read: u64,
    writes: u64,
    write_errors: u64,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Producers selected by `--producer`, or all of them
    fn selected(&self) -> Result<Vec<&ProducerEntry>, CliError> {
        let producers = &self.config.producer_config.producers;
        match &self.config.producer {
            None => Ok(producers.iter().collect()),
            Some(name) => self
                .config
                .producer_config
                .producer(name)
                .map(|entry| vec![entry])
                .ok_or_else(|| {
                    CliError::producer_not_found(name, producers.iter().map(|p| p.name.as_str()))
                }),
        }
    }

    fn recorder(&self, summary: &Arc<SummaryRecorder>) -> Arc<dyn MetricRecorder> {
        let mut recorder = CompositeRecorder::new().with(Arc::clone(summary) as Arc<dyn MetricRecorder>);
        if self.config.export_metrics {
            recorder = recorder.with(Arc::new(FacadeMetricRecorder::new()));
        }
        Arc::new(recorder)
    }

    /// Build one daemon per selected producer
    async fn build_registry(
        &self,
        recorder: &Arc<dyn MetricRecorder>,
    ) -> Result<DaemonRegistry<AnySink>, CliError> {
        let registry = DaemonRegistry::new();

        for entry in self.selected()? {
            let sink = create_sink(&entry.sink).await?;
            registry.provide(&entry.name, |name| {
                ProducerDaemon::builder(name, entry.daemon.clone(), sink)
                    .recorder(Arc::clone(recorder))
                    .build()
            })?;
            debug!(producer = %entry.name, sink = %entry.sink.name, "Producer daemon created");
        }

        Ok(registry)
    }

    async fn open_input(&self) -> Result<Box<dyn AsyncBufRead + Unpin + Send>, CliError> {
        match &self.config.input {
            Some(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|e| CliError::input(path.display().to_string(), e))?;
                Ok(Box::new(BufReader::new(file)))
            }
            None => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
        }
    }

    /// Run the pipeline until EOF, timeout or `shutdown`, then drain every daemon
    #[instrument(name = "pipeline_run", skip_all)]
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        let start = Instant::now();

        let summary = Arc::new(SummaryRecorder::new());
        let recorder = self.recorder(&summary);
        let registry = self.build_registry(&recorder).await?;
        let input = self.open_input().await?;

        let names = registry.names();
        let daemons: Vec<Daemon> = names.iter().filter_map(|n| registry.get(n)).collect();
        let started = registry.spawn_all();
        info!(daemons = started, "Producer daemons started");

        let mut progress = FeedProgress::default();

        let deadline = async {
            match self.config.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        // feed stops at the next line boundary; an in-flight write always completes
        let stop = CancellationToken::new();
        let fed = {
            let feeding = feed(
                input,
                &daemons,
                self.config.lines_per_write,
                &mut progress,
                &stop,
            );
            tokio::pin!(feeding);

            tokio::select! {
                result = &mut feeding => result,
                _ = deadline => {
                    warn!(timeout = ?self.config.timeout, "Timeout reached, stopping input");
                    stop.cancel();
                    feeding.await
                }
                _ = shutdown => {
                    warn!("Received shutdown signal, stopping input");
                    stop.cancel();
                    feeding.await
                }
            }
        };

        info!("Draining producer daemons");
        let shutdown_result = registry.shutdown().await;

        let reports = daemons
            .iter()
            .map(|d| DaemonReport {
                name: d.name().to_string(),
                sink: d.sink().name().to_string(),
                lifecycle: d.lifecycle().to_string(),
                stats: d.stats().snapshot(),
            })
            .collect();

        let failure = match (fed, shutdown_result) {
            (Err(e), _) => Some(e.to_string()),
            (Ok(()), Err(e)) => Some(e.to_string()),
            (Ok(()), Ok(())) => None,
        };

        Ok(PipelineStats {
            lines_read: progress.lines_read,
            writes: progress.writes,
            write_errors: progress.write_errors,
            duration: start.elapsed(),
            daemons: reports,
            metrics: summary.summary(),
            failure,
        })
    }
}

/// Read lines and write every group of `lines_per_write` to each daemon
///
/// Stops at end of input or once `stop` fires. `stop` is only checked while
/// waiting for the next line, so no write is abandoned halfway; lines already
/// read are written before returning.
async fn feed<R>(
    input: R,
    daemons: &[Daemon],
    lines_per_write: usize,
    progress: &mut FeedProgress,
    stop: &CancellationToken,
) -> Result<(), CliError>
where
    R: AsyncBufRead + Unpin,
{
    let lines_per_write = lines_per_write.max(1);
    let mut lines = input.lines();
    let mut pending = Vec::with_capacity(lines_per_write);

    loop {
        let line = tokio::select! {
            biased;
            _ = stop.cancelled() => None,
            line = lines.next_line() => line.map_err(|e| CliError::input("input", e))?,
        };

        let done = line.is_none();
        if let Some(line) = line {
            progress.lines_read += 1;
            pending.push(Message::new(line).with_attribute(ATTRIBUTE_LINE, progress.lines_read));
        }

        if pending.len() >= lines_per_write || (done && !pending.is_empty()) {
            let messages = std::mem::take(&mut pending);
            for daemon in daemons {
                progress.writes += 1;
                if let Err(e) = daemon.write(messages.clone()).await {
                    progress.write_errors += 1;
                    error!(producer = daemon.name(), error = %e, "Write failed");
                }
            }
        }

        if done {
            if stop.is_cancelled() {
                info!(lines = progress.lines_read, "Input stopped");
            } else {
                info!(lines = progress.lines_read, "Input exhausted");
            }
            return Ok(());
        }
    }
}
