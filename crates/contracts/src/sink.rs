//! OutputSink trait - producer daemon output interface
//!
//! Defines the abstract interface for Sinks.

use tokio_util::sync::CancellationToken;

use crate::{Message, SinkError};

/// Data output trait
///
/// All sink implementations must implement this trait. A single sink instance
/// is shared by every output runner, so writes take `&self` and may run
/// concurrently.
#[trait_variant::make(OutputSink: Send)]
pub trait LocalOutputSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one batch of carrier messages
    ///
    /// `cancel` is the daemon's surrounding cancellation signal. The daemon
    /// never aborts an in-flight write itself; a sink that honors the signal
    /// reports [`SinkError::Canceled`].
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&self, cancel: &CancellationToken, batch: &[Message]) -> Result<(), SinkError>;

    /// Close sink
    async fn close(&self) -> Result<(), SinkError>;
}
