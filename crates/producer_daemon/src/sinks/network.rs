//! NetworkSink - UDP fire-and-forget streaming, one datagram per batch

use contracts::{Message, OutputSink, SinkError};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Serialization format for network transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    /// JSON (human-readable, larger)
    #[default]
    Json,
    /// Bincode (binary, compact)
    Bincode,
}

/// Configuration for NetworkSink
#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    /// Target address
    pub addr: SocketAddr,
    /// Serialization format
    pub format: NetworkFormat,
    /// Max datagram size (UDP typically 65507 for IPv4)
    pub max_packet_size: usize,
}

impl NetworkSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let format = match params.get("format").map(String::as_str) {
            Some("bincode") => NetworkFormat::Bincode,
            Some("json") | None => NetworkFormat::Json,
            Some(other) => return Err(format!("unknown format '{}'", other)),
        };

        let max_packet_size = match params.get("max_packet_size") {
            Some(s) => s
                .parse()
                .map_err(|e| format!("invalid max_packet_size '{}': {}", s, e))?,
            None => 65000,
        };

        Ok(Self {
            addr,
            format,
            max_packet_size,
        })
    }
}

/// Sink that sends batches over UDP
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    socket: UdpSocket,
    closed: AtomicBool,
}

impl NetworkSink {
    /// Create a new NetworkSink
    #[instrument(name = "network_sink_new", skip(name, config))]
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        // Bind to any available port
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(&config.addr).await?;

        debug!(
            sink = %name,
            target = %config.addr,
            "NetworkSink connected"
        );

        Ok(Self {
            name,
            config,
            socket,
            closed: AtomicBool::new(false),
        })
    }

    /// Create from params (for factory)
    #[instrument(name = "network_sink_from_params", skip(name, params))]
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, SinkError> {
        let name = name.into();
        let config =
            NetworkSinkConfig::from_params(params).map_err(|e| SinkError::connection(&name, e))?;

        Self::new(name.clone(), config)
            .await
            .map_err(|e| SinkError::connection(&name, e.to_string()))
    }

    fn serialize_batch(&self, batch: &[Message]) -> Result<Vec<u8>, String> {
        match self.config.format {
            NetworkFormat::Json => {
                serde_json::to_vec(batch).map_err(|e| format!("json error: {}", e))
            }
            NetworkFormat::Bincode => {
                bincode::serialize(batch).map_err(|e| format!("bincode error: {}", e))
            }
        }
    }

    fn prepare_payload(&self, batch: &[Message]) -> Result<Vec<u8>, SinkError> {
        let data = self
            .serialize_batch(batch)
            .map_err(|e| SinkError::write(&self.name, e))?;

        if data.len() > self.config.max_packet_size {
            warn!(
                sink = %self.name,
                size = data.len(),
                max = self.config.max_packet_size,
                "Packet too large, batch dropped"
            );
            return Err(SinkError::write(
                &self.name,
                format!(
                    "payload of {} bytes exceeds max_packet_size {}",
                    data.len(),
                    self.config.max_packet_size
                ),
            ));
        }

        Ok(data)
    }
}

impl OutputSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_sink_write",
        skip(self, cancel, batch),
        fields(sink = %self.name, batch_size = batch.len())
    )]
    async fn write(&self, cancel: &CancellationToken, batch: &[Message]) -> Result<(), SinkError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SinkError::connection(&self.name, "socket closed"));
        }

        let data = self.prepare_payload(batch)?;

        // A ready socket always wins; the token only aborts a send that would block
        tokio::select! {
            biased;
            sent = self.socket.send(&data) => {
                let sent = sent.map_err(|e| SinkError::write(&self.name, e.to_string()))?;
                debug!(sink = %self.name, bytes = sent, "Sent");
                Ok(())
            }
            _ = cancel.cancelled() => Err(SinkError::canceled(&self.name, "send aborted by cancellation")),
        }
    }

    #[instrument(name = "network_sink_close", skip(self))]
    async fn close(&self) -> Result<(), SinkError> {
        self.closed.store(true, Ordering::Release);
        debug!(sink = %self.name, "NetworkSink closed");
        Ok(())
    }
}
