//! ProducerDaemon - controller, lifecycle and the write path

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use contracts::{
    AggregateFolder, DaemonError, DaemonSettings, Message, MetricRecorder,
    NoopMetricRecorder, OutputSink,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::aggregator::Aggregator;
use crate::batcher::Batcher;
use crate::folder::JsonAggregateFolder;
use crate::metrics::{DaemonStats, MetricWriter};
use crate::output_channel::{output_channel, OutputReceiver, OutputSender};
use crate::scheduler::run_flush_scheduler;
use crate::supervisor::TaskGroup;
use crate::ticker::{IntervalTicker, Ticker};
use crate::worker::OutputRunner;

/// Daemon lifecycle stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    /// Built, `run` not called yet; writes are buffered
    Created = 0,
    /// Runners and scheduler are up
    Running = 1,
    /// Final flush in progress, writes are rejected
    Draining = 2,
    /// Every runner exited
    Closed = 3,
}

impl Lifecycle {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Draining,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Builder for [`ProducerDaemon`]
pub struct ProducerDaemonBuilder<S, T = IntervalTicker> {
    name: String,
    settings: DaemonSettings,
    sink: S,
    ticker: T,
    folder: Arc<dyn AggregateFolder>,
    recorder: Arc<dyn MetricRecorder>,
}

impl<S, T> ProducerDaemonBuilder<S, T>
where
    S: OutputSink + Sync + 'static,
    T: Ticker + Sync + 'static,
{
    /// Folding capability, defaults to [`JsonAggregateFolder`]
    pub fn folder(mut self, folder: impl AggregateFolder + 'static) -> Self {
        self.folder = Arc::new(folder);
        self
    }

    /// Metrics capability, defaults to [`NoopMetricRecorder`]
    pub fn recorder(mut self, recorder: Arc<dyn MetricRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Flush ticker, defaults to an [`IntervalTicker`] with the configured interval
    pub fn ticker<U>(self, ticker: U) -> ProducerDaemonBuilder<S, U>
    where
        U: Ticker + Sync + 'static,
    {
        ProducerDaemonBuilder {
            name: self.name,
            settings: self.settings,
            sink: self.sink,
            ticker,
            folder: self.folder,
            recorder: self.recorder,
        }
    }

    /// Validate settings and assemble the daemon
    ///
    /// # Errors
    /// Returns a config error for an empty name or out-of-range settings.
    #[instrument(name = "producer_daemon_build", skip(self), fields(daemon = %self.name))]
    pub fn build(self) -> Result<ProducerDaemon<S, T>, DaemonError> {
        if self.name.trim().is_empty() {
            return Err(DaemonError::config_validation("name", "must not be empty"));
        }
        self.settings.check()?;

        let stats = Arc::new(DaemonStats::new());
        let metrics = MetricWriter::new(&self.name, self.recorder, self.settings.interval());
        let (sender, receiver) = output_channel(self.settings.buffer_size);

        let aggregator = Aggregator::new(
            self.settings.aggregation_size,
            &self.settings.message_attributes,
            self.folder,
            metrics.clone(),
            Arc::clone(&stats),
        );

        debug!(
            batch_size = self.settings.batch_size,
            aggregation_size = self.settings.aggregation_size,
            "producer daemon built"
        );

        Ok(ProducerDaemon {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    aggregator,
                    batcher: Batcher::new(self.settings.batch_size),
                    sender,
                    closed: false,
                }),
                receiver: StdMutex::new(Some(receiver)),
                lifecycle: AtomicU8::new(Lifecycle::Created as u8),
                name: self.name,
                settings: self.settings,
                sink: Arc::new(self.sink),
                ticker: self.ticker,
                metrics,
                stats,
            }),
        })
    }
}

/// Buffers guarded by the state lock
struct State {
    aggregator: Aggregator,
    batcher: Batcher,
    sender: OutputSender,
    closed: bool,
}

/// State shared between the handle, the scheduler and `run`
pub(crate) struct Shared<S, T> {
    pub(crate) name: String,
    pub(crate) ticker: T,
    settings: DaemonSettings,
    sink: Arc<S>,
    state: Mutex<State>,
    // Outside the state lock: a writer may hold the lock while waiting for
    // channel capacity that only the runners started by `run` can free.
    receiver: StdMutex<Option<OutputReceiver>>,
    lifecycle: AtomicU8,
    metrics: MetricWriter,
    stats: Arc<DaemonStats>,
}

impl<S, T> Shared<S, T>
where
    S: OutputSink + Sync + 'static,
    T: Ticker + Sync + 'static,
{
    fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    fn set_lifecycle(&self, stage: Lifecycle) {
        self.lifecycle.store(stage as u8, Ordering::Release);
        debug!(daemon = %self.name, lifecycle = %stage, "lifecycle changed");
    }

    fn take_receiver(&self) -> Option<OutputReceiver> {
        self.receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Hand the front batch to the output channel
    ///
    /// The batch leaves the buffer only after the send completed, so a caller
    /// dropped while waiting for channel capacity loses nothing. Returns false
    /// when nothing is buffered.
    async fn dispatch_front(&self, state: &mut State) -> bool {
        let Some(batch) = state.batcher.peek_batch() else {
            return false;
        };
        let size = batch.len();
        if state.sender.write(batch).await {
            self.stats.inc_batches_dispatched();
        }
        state.batcher.consume(size);
        true
    }

    /// Forced flush: everything buffered leaves, even below thresholds
    ///
    /// A fold failure still flushes the batch buffer before it is returned.
    async fn forced_flush(&self, state: &mut State) -> Result<(), DaemonError> {
        let folded = match state.aggregator.flush() {
            Ok(Some(carrier)) => {
                state.batcher.append(vec![carrier]);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };

        while self.dispatch_front(state).await {}

        folded
    }

    pub(crate) async fn flush_on_tick(&self) -> Result<(), DaemonError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Ok(());
        }
        self.forced_flush(&mut state).await
    }

    /// Final flush, then close the output channel
    async fn drain(&self) -> Result<(), DaemonError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Ok(());
        }

        debug!(
            daemon = %self.name,
            pending_messages = state.aggregator.len(),
            pending_carriers = state.batcher.len(),
            "final flush"
        );
        let flushed = self.forced_flush(&mut state).await;
        state.closed = true;
        state.sender.close();
        flushed
    }
}

/// Outbound message batching daemon
///
/// Cheap to clone; clones share one daemon.
pub struct ProducerDaemon<S, T = IntervalTicker> {
    shared: Arc<Shared<S, T>>,
}

impl<S, T> Clone for ProducerDaemon<S, T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> ProducerDaemon<S, IntervalTicker>
where
    S: OutputSink + Sync + 'static,
{
    /// Start building a daemon
    pub fn builder(
        name: impl Into<String>,
        settings: DaemonSettings,
        sink: S,
    ) -> ProducerDaemonBuilder<S, IntervalTicker> {
        let ticker = IntervalTicker::new(settings.interval());
        ProducerDaemonBuilder {
            name: name.into(),
            settings,
            sink,
            ticker,
            folder: Arc::new(JsonAggregateFolder),
            recorder: Arc::new(NoopMetricRecorder),
        }
    }
}

impl<S, T> ProducerDaemon<S, T>
where
    S: OutputSink + Sync + 'static,
    T: Ticker + Sync + 'static,
{
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn settings(&self) -> &DaemonSettings {
        &self.shared.settings
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.lifecycle()
    }

    pub fn stats(&self) -> &DaemonStats {
        &self.shared.stats
    }

    pub fn sink(&self) -> &S {
        &self.shared.sink
    }

    /// Write one message
    pub async fn write_one(&self, message: Message) -> Result<(), DaemonError> {
        self.write(vec![message]).await
    }

    /// Write messages as one unit
    ///
    /// Suspends while the output channel is full. Dropping the future while
    /// it waits keeps every accepted message buffered for a later flush.
    ///
    /// # Errors
    /// - `Lifecycle` once draining started
    /// - `Fold` if an aggregate can not be built; the group's messages are lost
    pub async fn write(&self, messages: Vec<Message>) -> Result<(), DaemonError> {
        let shared = &self.shared;
        let mut guard = shared.state.lock().await;
        let state = &mut *guard;

        if state.closed {
            warn!(daemon = %shared.name, dropped = messages.len(), "write after close");
            return Err(DaemonError::lifecycle(format!(
                "producer daemon '{}' is closed",
                shared.name
            )));
        }

        shared.metrics.message_count(messages.len());
        shared.stats.add_messages_written(messages.len());

        let carriers = state.aggregator.apply(messages).map_err(|e| {
            DaemonError::fold(format!(
                "can not apply aggregation in producer {}: {}",
                shared.name,
                e.message()
            ))
            .with_source(e)
        })?;
        state.batcher.append(carriers);

        let mut flushed = false;
        while state.batcher.is_ready() {
            shared.dispatch_front(state).await;
            flushed = true;
        }

        if flushed {
            shared.ticker.reset();
        }

        Ok(())
    }

    /// Run until `cancel` fires or a supervised task fails, then drain
    ///
    /// Starts the output runners before the flush scheduler. Returns the first
    /// task failure, else a fold failure of the final flush.
    ///
    /// # Errors
    /// `Lifecycle` if called more than once.
    #[instrument(name = "producer_daemon_run", skip_all, fields(daemon = %self.shared.name))]
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), DaemonError> {
        let shared = &self.shared;
        let receiver = shared.take_receiver().ok_or_else(|| {
            DaemonError::lifecycle(format!(
                "producer daemon '{}' was already started",
                shared.name
            ))
        })?;

        shared.set_lifecycle(Lifecycle::Running);
        info!(
            runners = shared.settings.runner_count,
            batch_size = shared.settings.batch_size,
            aggregation_size = shared.settings.aggregation_size,
            interval_ms = shared.settings.interval_ms,
            "producer daemon started"
        );

        let mut group = TaskGroup::new(&cancel);
        for id in 0..shared.settings.runner_count {
            let runner = OutputRunner {
                daemon: shared.name.clone(),
                sink: Arc::clone(&shared.sink),
                receiver: receiver.clone(),
                cancel: group.token(),
                metrics: shared.metrics.clone(),
                stats: Arc::clone(&shared.stats),
            };
            group.spawn(format!("output-runner-{id}"), runner.run(id));
        }
        drop(receiver);

        // interval counts from start, not from build
        shared.ticker.reset();
        group.spawn(
            "flush-scheduler",
            run_flush_scheduler(Arc::clone(shared), group.token()),
        );

        group.supervise().await;

        shared.set_lifecycle(Lifecycle::Draining);
        let drained = shared.drain().await;
        if let Err(e) = &drained {
            error!(error = %e, "can not flush all messages on close");
        }

        let joined = group.join().await;

        if let Err(e) = shared.sink.close().await {
            error!(sink = shared.sink.name(), error = %e, "sink close failed");
        }

        shared.set_lifecycle(Lifecycle::Closed);
        let stats = shared.stats.snapshot();
        info!(
            messages = stats.messages_written,
            batches_written = stats.batches_written,
            batches_failed = stats.batches_failed,
            "producer daemon stopped"
        );

        joined.and(drained)
    }
}
