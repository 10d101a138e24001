//! Sink implementations
//!
//! Contains LogSink, FileSink, and NetworkSink, plus the config-driven
//! [`AnySink`] factory.

mod file;
mod log;
mod network;

pub use self::file::{FileSink, FileSinkConfig};
pub use self::log::LogSink;
pub use self::network::{NetworkFormat, NetworkSink, NetworkSinkConfig};

use contracts::{DaemonError, Message, OutputSink, SinkConfig, SinkError, SinkType};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Any of the built-in sinks, selected by [`SinkType`]
pub enum AnySink {
    Log(LogSink),
    File(FileSink),
    Network(NetworkSink),
}

impl OutputSink for AnySink {
    fn name(&self) -> &str {
        match self {
            Self::Log(s) => s.name(),
            Self::File(s) => s.name(),
            Self::Network(s) => s.name(),
        }
    }

    async fn write(&self, cancel: &CancellationToken, batch: &[Message]) -> Result<(), SinkError> {
        match self {
            Self::Log(s) => s.write(cancel, batch).await,
            Self::File(s) => s.write(cancel, batch).await,
            Self::Network(s) => s.write(cancel, batch).await,
        }
    }

    async fn close(&self) -> Result<(), SinkError> {
        match self {
            Self::Log(s) => s.close().await,
            Self::File(s) => s.close().await,
            Self::Network(s) => s.close().await,
        }
    }
}

/// Create a sink from configuration
#[instrument(
    name = "create_sink",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
pub async fn create_sink(config: &SinkConfig) -> Result<AnySink, DaemonError> {
    let sink = match config.sink_type {
        SinkType::Log => AnySink::Log(LogSink::new(&config.name)),
        SinkType::File => AnySink::File(FileSink::from_params(&config.name, &config.params)?),
        SinkType::Network => {
            AnySink::Network(NetworkSink::from_params(&config.name, &config.params).await?)
        }
    };
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ErrorKind;
    use std::collections::HashMap;

    fn sink_config(sink_type: SinkType, params: &[(&str, &str)]) -> SinkConfig {
        SinkConfig {
            name: "out".to_string(),
            sink_type,
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[tokio::test]
    async fn test_create_each_sink_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        let log = create_sink(&sink_config(SinkType::Log, &[])).await.unwrap();
        assert!(matches!(log, AnySink::Log(_)));

        let file = create_sink(&sink_config(
            SinkType::File,
            &[("path", path.to_str().unwrap())],
        ))
        .await
        .unwrap();
        assert!(matches!(file, AnySink::File(_)));
        assert_eq!(file.name(), "out");

        let net = create_sink(&sink_config(SinkType::Network, &[("addr", "127.0.0.1:19996")]))
            .await
            .unwrap();
        assert!(matches!(net, AnySink::Network(_)));
    }

    #[tokio::test]
    async fn test_bad_params_are_sink_errors() {
        let err = create_sink(&sink_config(SinkType::Network, &[("addr", "nowhere")]))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Sink);
        assert!(err.to_string().contains("invalid address"));
    }
}
