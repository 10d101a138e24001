//! # Producer Daemon
//!
//! 出站消息批处理守护模块。
//!
//! 负责：
//! - 缓冲大量并发 `write` 调用的消息
//! - 可选地将 N 条原始消息折叠为一条聚合消息
//! - 按固定大小组批，并交给 N 个 output runner 写入下游 sink
//! - 定时强制 flush，限制端到端延迟
//! - 关闭时最终 flush 并排空输出通道

mod aggregator;
mod batcher;
mod daemon;
pub mod folder;
pub mod metrics;
pub mod output_channel;
pub mod registry;
mod scheduler;
pub mod sinks;
mod supervisor;
pub mod ticker;
mod worker;

pub use contracts::{Message, OutputSink};
pub use daemon::{Lifecycle, ProducerDaemon, ProducerDaemonBuilder};
pub use folder::{unpack_aggregate, JsonAggregateFolder, ENCODING_JSON};
pub use metrics::{
    DaemonStats, StatsSnapshot, DIMENSION_DAEMON, METRIC_AGGREGATE_SIZE, METRIC_BATCH_SIZE,
    METRIC_IDLE_DURATION, METRIC_MESSAGE_COUNT,
};
pub use output_channel::{output_channel, OutputReceiver, OutputSender};
pub use registry::DaemonRegistry;
pub use sinks::{create_sink, AnySink, FileSink, LogSink, NetworkSink};
pub use ticker::{IntervalTicker, LocalTicker, ManualTicker, Ticker};
