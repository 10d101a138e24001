//! End-to-end: write → aggregator → batcher → output runners → sink

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    AggregateFolder, Attributes, DaemonError, ErrorKind, FoldError, Message, OutputSink,
    ATTRIBUTE_ENCODING,
};
use observability::SummaryRecorder;
use producer_daemon::{
    DaemonRegistry, JsonAggregateFolder, Lifecycle, ManualTicker, ProducerDaemon, Ticker,
    ENCODING_JSON,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::support::{eventually, numbered, settings, CollectSink, FlakySink, PanicSink};

type RunHandle = JoinHandle<Result<(), DaemonError>>;

/// Spawn `run` for a daemon, returning the token that stops it
fn start<S, T>(daemon: &ProducerDaemon<S, T>) -> (CancellationToken, RunHandle)
where
    S: OutputSink + Sync + 'static,
    T: Ticker + Sync + 'static,
{
    let cancel = CancellationToken::new();
    let daemon = daemon.clone();
    let token = cancel.clone();
    (cancel, tokio::spawn(async move { daemon.run(token).await }))
}

async fn stop(cancel: CancellationToken, handle: RunHandle) -> Result<(), DaemonError> {
    cancel.cancel();
    handle.await.unwrap()
}

#[tokio::test]
async fn test_single_runner_preserves_write_order() {
    let daemon = ProducerDaemon::builder("fifo", settings(3, 1, 1), CollectSink::default())
        .ticker(ManualTicker::new())
        .build()
        .unwrap();
    let (cancel, handle) = start(&daemon);

    for message in numbered(0..10) {
        daemon.write_one(message).await.unwrap();
    }
    stop(cancel, handle).await.unwrap();

    let sink = daemon.sink();
    assert_eq!(sink.sizes(), vec![3, 3, 3, 1]);
    let expected: Vec<String> = (0..10).map(|i| i.to_string()).collect();
    assert_eq!(sink.bodies(), expected);
}

#[tokio::test]
async fn test_aggregates_unpack_to_original_messages() {
    let mut config = settings(2, 3, 1);
    config
        .message_attributes
        .insert("source".to_string(), "e2e".into());

    let daemon = ProducerDaemon::builder("agg", config, CollectSink::default())
        .ticker(ManualTicker::new())
        .build()
        .unwrap();
    let (cancel, handle) = start(&daemon);

    daemon.write(numbered(0..10)).await.unwrap();
    stop(cancel, handle).await.unwrap();

    let sink = daemon.sink();
    // three full groups plus the remainder folded on close
    assert_eq!(sink.sizes(), vec![2, 2]);
    for carrier in sink.batches().iter().flatten() {
        assert!(carrier.is_aggregate());
        assert_eq!(carrier.attribute("source"), Some(&"e2e".into()));
        assert_eq!(
            carrier.attribute(ATTRIBUTE_ENCODING),
            Some(&ENCODING_JSON.into())
        );
    }

    let expected: Vec<String> = (0..10).map(|i| i.to_string()).collect();
    assert_eq!(sink.bodies(), expected);
    assert_eq!(daemon.stats().aggregates_folded(), 4);
}

#[tokio::test]
async fn test_tick_flushes_partial_batch() {
    let ticker = ManualTicker::new();
    let daemon = ProducerDaemon::builder("tick", settings(10, 1, 1), CollectSink::default())
        .ticker(ticker.clone())
        .build()
        .unwrap();
    let (cancel, handle) = start(&daemon);

    daemon.write(numbered(0..4)).await.unwrap();
    assert!(daemon.sink().sizes().is_empty());

    ticker.fire();
    assert!(eventually(|| daemon.sink().sizes() == vec![4]).await);
    assert_eq!(daemon.lifecycle(), Lifecycle::Running);

    // a tick with nothing buffered sends nothing
    ticker.fire();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(daemon.sink().sizes(), vec![4]);

    stop(cancel, handle).await.unwrap();
    assert!(ticker.is_stopped());
}

#[tokio::test(start_paused = true)]
async fn test_threshold_batches_then_interval_flush() {
    let mut config = settings(10, 1, 1);
    config.interval_ms = 1000;

    let daemon = ProducerDaemon::builder("timed", config, CollectSink::default())
        .build()
        .unwrap();
    let (cancel, handle) = start(&daemon);

    daemon.write(numbered(0..25)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(daemon.sink().sizes(), vec![10, 10]);

    tokio::time::sleep(Duration::from_millis(900)).await;
    assert_eq!(daemon.sink().sizes(), vec![10, 10]);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(daemon.sink().sizes(), vec![10, 10, 5]);

    stop(cancel, handle).await.unwrap();
    assert_eq!(daemon.sink().sizes(), vec![10, 10, 5]);
}

#[tokio::test]
async fn test_close_drains_buffered_writes() {
    let daemon = ProducerDaemon::builder("drain", settings(10, 1, 2), CollectSink::default())
        .ticker(ManualTicker::new())
        .build()
        .unwrap();

    // accepted before run
    daemon.write(numbered(0..5)).await.unwrap();

    let (cancel, handle) = start(&daemon);
    stop(cancel, handle).await.unwrap();

    assert_eq!(daemon.lifecycle(), Lifecycle::Closed);
    assert_eq!(daemon.sink().sizes(), vec![5]);

    let err = daemon.write_one(Message::new("late")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lifecycle);

    let stats = daemon.stats().snapshot();
    assert_eq!(stats.messages_written, 5);
    assert_eq!(stats.batches_dispatched, 1);
    assert_eq!(stats.batches_written, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_lose_nothing() {
    const WRITERS: usize = 50;
    const PER_WRITER: usize = 20;

    let mut config = settings(7, 3, 4);
    config.buffer_size = 2;
    let daemon = ProducerDaemon::builder("busy", config, CollectSink::default())
        .ticker(ManualTicker::new())
        .build()
        .unwrap();
    let (cancel, handle) = start(&daemon);

    let writers: Vec<_> = (0..WRITERS)
        .map(|w| {
            let daemon = daemon.clone();
            tokio::spawn(async move {
                for i in 0..PER_WRITER {
                    daemon
                        .write_one(Message::new(format!("{w}-{i}")))
                        .await
                        .unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }
    stop(cancel, handle).await.unwrap();

    let sink = daemon.sink();
    assert!(sink.sizes().iter().all(|&n| (1..=7).contains(&n)));

    let bodies = sink.bodies();
    assert_eq!(bodies.len(), WRITERS * PER_WRITER);
    let unique: HashSet<_> = bodies.iter().collect();
    assert_eq!(unique.len(), WRITERS * PER_WRITER);

    let stats = daemon.stats().snapshot();
    assert_eq!(stats.messages_written, (WRITERS * PER_WRITER) as u64);
    assert_eq!(stats.messages_dropped, 0);
    assert_eq!(stats.batches_failed, 0);
    let carriers: usize = sink.sizes().iter().sum();
    assert_eq!(stats.aggregates_folded, carriers as u64);
}

#[tokio::test]
async fn test_sink_errors_do_not_stop_runners() {
    let daemon = ProducerDaemon::builder("flaky", settings(1, 1, 1), FlakySink::new(1))
        .ticker(ManualTicker::new())
        .build()
        .unwrap();
    let (cancel, handle) = start(&daemon);

    daemon.write(numbered(0..3)).await.unwrap();
    assert!(eventually(|| daemon.stats().batches_written() == 2).await);
    stop(cancel, handle).await.unwrap();

    assert_eq!(daemon.stats().batches_failed(), 1);
    assert_eq!(daemon.sink().inner.bodies(), vec!["1", "2"]);
}

#[tokio::test]
async fn test_fold_failure_surfaces_and_drops_group() {
    let failing = |_: &[Message], _: &Attributes| -> Result<Message, FoldError> {
        Err(FoldError::encode("broken folder"))
    };
    let daemon = ProducerDaemon::builder("fold", settings(5, 2, 1), CollectSink::default())
        .ticker(ManualTicker::new())
        .folder(failing)
        .build()
        .unwrap();
    let (cancel, handle) = start(&daemon);

    let err = daemon.write(numbered(0..3)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Fold);
    assert!(err
        .to_string()
        .contains("can not apply aggregation in producer fold"));
    assert_eq!(daemon.stats().messages_dropped(), 2);

    // the leftover message fails again on the final flush
    let err = stop(cancel, handle).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Fold);
    assert_eq!(daemon.stats().messages_dropped(), 3);
    assert!(daemon.sink().sizes().is_empty());
    assert_eq!(daemon.lifecycle(), Lifecycle::Closed);
}

#[tokio::test]
async fn test_tick_fold_failure_keeps_scheduler_running() {
    let failed_once = Arc::new(AtomicBool::new(false));
    let folder = {
        let failed_once = Arc::clone(&failed_once);
        move |messages: &[Message], attributes: &Attributes| -> Result<Message, FoldError> {
            if !failed_once.swap(true, Ordering::SeqCst) {
                return Err(FoldError::encode("first fold fails"));
            }
            JsonAggregateFolder.fold(messages, attributes)
        }
    };

    let ticker = ManualTicker::new();
    let daemon = ProducerDaemon::builder("tick-fold", settings(10, 3, 1), CollectSink::default())
        .ticker(ticker.clone())
        .folder(folder)
        .build()
        .unwrap();
    let (cancel, handle) = start(&daemon);

    daemon.write(numbered(0..2)).await.unwrap();
    ticker.fire();
    assert!(eventually(|| daemon.stats().messages_dropped() == 2).await);
    assert_eq!(daemon.lifecycle(), Lifecycle::Running);
    assert!(daemon.sink().sizes().is_empty());

    daemon.write(numbered(2..3)).await.unwrap();
    ticker.fire();
    assert!(eventually(|| daemon.sink().sizes() == vec![1]).await);
    assert!(daemon.sink().batches()[0][0].is_aggregate());
    assert_eq!(daemon.sink().bodies(), vec!["2"]);
    assert_eq!(daemon.lifecycle(), Lifecycle::Running);

    stop(cancel, handle).await.unwrap();
    assert_eq!(daemon.stats().messages_dropped(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_interval_counts_from_run_not_build() {
    let mut config = settings(10, 1, 1);
    config.interval_ms = 1000;

    let daemon = ProducerDaemon::builder("late-start", config, CollectSink::default())
        .build()
        .unwrap();
    daemon.write_one(Message::new("early")).await.unwrap();

    // built long before it is started
    tokio::time::sleep(Duration::from_secs(5)).await;
    let (cancel, handle) = start(&daemon);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(daemon.sink().sizes().is_empty());

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(daemon.sink().sizes(), vec![1]);

    stop(cancel, handle).await.unwrap();
}

#[tokio::test]
async fn test_sink_panic_stops_daemon_with_error() {
    let daemon = ProducerDaemon::builder("boom", settings(1, 1, 2), PanicSink)
        .ticker(ManualTicker::new())
        .build()
        .unwrap();
    let (_cancel, handle) = start(&daemon);

    daemon.write_one(Message::new("trigger")).await.unwrap();

    let err = handle.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Panic);
    assert!(err.to_string().contains("sink exploded"));
    assert_eq!(daemon.lifecycle(), Lifecycle::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_idle_duration_bounded_by_interval() {
    let mut config = settings(10, 1, 2);
    config.interval_ms = 100;

    let summary = Arc::new(SummaryRecorder::new());
    let daemon = ProducerDaemon::builder("idle", config, CollectSink::default())
        .recorder(summary.clone())
        .build()
        .unwrap();
    let (cancel, handle) = start(&daemon);

    daemon.write_one(Message::new("only")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    stop(cancel, handle).await.unwrap();

    let idle = summary.get("idle/IdleDuration").unwrap();
    assert_eq!(idle.count, 1);
    assert!(idle.max <= 100.0, "idle {} exceeds interval", idle.max);

    assert_eq!(summary.get("idle/MessageCount").unwrap().sum, 1.0);
    assert_eq!(summary.get("idle/BatchSize").unwrap().max, 1.0);
    assert!(summary.get("idle/AggregateSize").is_none());
}

#[tokio::test]
async fn test_registry_runs_and_drains_every_daemon() {
    let registry: DaemonRegistry<CollectSink, ManualTicker> = DaemonRegistry::new();

    for name in ["orders", "events"] {
        registry
            .provide(name, |name| {
                ProducerDaemon::builder(name, settings(4, 1, 1), CollectSink::default())
                    .ticker(ManualTicker::new())
                    .build()
            })
            .unwrap();
    }
    assert_eq!(registry.spawn_all(), 2);

    for name in registry.names() {
        let daemon = registry.get(&name).unwrap();
        daemon.write(numbered(0..6)).await.unwrap();
    }

    registry.shutdown().await.unwrap();

    for name in ["orders", "events"] {
        let daemon = registry.get(name).unwrap();
        assert_eq!(daemon.lifecycle(), Lifecycle::Closed);
        assert_eq!(daemon.sink().sizes(), vec![4, 2]);
    }
}
