//! FileSink - appends carrier messages to a JSON-lines file

use contracts::{Message, OutputSink, SinkError};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file, created if missing and appended to otherwise
    pub path: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let path = params
            .get("path")
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| "missing 'path' parameter".to_string())?;

        Ok(Self {
            path: PathBuf::from(path),
        })
    }
}

/// Sink that writes one JSON line per carrier message
///
/// Concurrent runners are serialized by an async mutex so lines never interleave.
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    file: Mutex<File>,
}

impl FileSink {
    /// Create a new FileSink, creating parent directories as needed
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)?;

        Ok(Self {
            name: name.into(),
            config,
            file: Mutex::new(File::from_std(file)),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, SinkError> {
        let name = name.into();
        let config =
            FileSinkConfig::from_params(params).map_err(|e| SinkError::connection(&name, e))?;
        Self::new(name.clone(), config).map_err(|e| SinkError::connection(&name, e.to_string()))
    }

    /// Output file path
    pub fn path(&self) -> &PathBuf {
        &self.config.path
    }

    fn encode_batch(&self, batch: &[Message]) -> Result<Vec<u8>, SinkError> {
        let mut buf = Vec::with_capacity(batch.iter().map(Message::len).sum::<usize>() + 64);
        for message in batch {
            serde_json::to_writer(&mut buf, message)
                .map_err(|e| SinkError::write(&self.name, format!("json error: {e}")))?;
            buf.push(b'\n');
        }
        Ok(buf)
    }
}

impl OutputSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, _cancel, batch),
        fields(sink = %self.name, batch_size = batch.len())
    )]
    async fn write(&self, _cancel: &CancellationToken, batch: &[Message]) -> Result<(), SinkError> {
        let data = self.encode_batch(batch)?;

        let mut file = self.file.lock().await;
        file.write_all(&data).await.map_err(|e| {
            error!(sink = %self.name, error = %e, "write failed");
            SinkError::write(&self.name, e.to_string())
        })?;
        file.flush().await?;
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&self) -> Result<(), SinkError> {
        let file = self.file.lock().await;
        file.sync_all().await?;
        debug!(sink = %self.name, path = %self.config.path.display(), "FileSink closed");
        Ok(())
    }
}
