//! Layered error definitions
//!
//! Categorized by source: config / fold / sink / panic / lifecycle

use std::fmt;

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error category of a [`DaemonError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid settings, surfaced at construction
    Config,
    /// The folding capability rejected an aggregate
    Fold,
    /// Sink construction or write failure
    Sink,
    /// A supervised task panicked
    Panic,
    /// Operation not allowed in the current lifecycle state
    Lifecycle,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Config => "config",
            Self::Fold => "fold",
            Self::Sink => "sink",
            Self::Panic => "panic",
            Self::Lifecycle => "lifecycle",
        };
        f.write_str(name)
    }
}

/// Unified daemon error
///
/// A kind tag, a human readable message and an optional wrapped cause.
#[derive(Debug, Error)]
#[error("{kind} error: {message}")]
pub struct DaemonError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl DaemonError {
    /// Create an error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attach a cause
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl AsRef<str>, message: impl AsRef<str>) -> Self {
        Self::new(
            ErrorKind::Config,
            format!("validation failed at '{}': {}", field.as_ref(), message.as_ref()),
        )
    }

    /// Create fold error
    pub fn fold(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fold, message)
    }

    /// Create sink error
    pub fn sink(sink_name: impl AsRef<str>, message: impl AsRef<str>) -> Self {
        Self::new(
            ErrorKind::Sink,
            format!("sink '{}': {}", sink_name.as_ref(), message.as_ref()),
        )
    }

    /// Create panic error
    pub fn panic(task: impl AsRef<str>, message: impl AsRef<str>) -> Self {
        Self::new(
            ErrorKind::Panic,
            format!("task '{}' panicked: {}", task.as_ref(), message.as_ref()),
        )
    }

    /// Create lifecycle error
    pub fn lifecycle(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Lifecycle, message)
    }

    /// Error category
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Message without the kind prefix
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<FoldError> for DaemonError {
    fn from(err: FoldError) -> Self {
        Self::fold(err.to_string()).with_source(err)
    }
}

impl From<SinkError> for DaemonError {
    fn from(err: SinkError) -> Self {
        Self::new(ErrorKind::Sink, err.to_string()).with_source(err)
    }
}

/// Folding capability errors
#[derive(Debug, Error)]
pub enum FoldError {
    /// Encoding the aggregate failed
    #[error("aggregate encode error: {message}")]
    Encode {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Decoding an aggregate back into its messages failed
    #[error("aggregate decode error: {message}")]
    Decode {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Nothing to fold
    #[error("cannot fold an empty aggregate")]
    Empty,
}

impl FoldError {
    /// Create encode error
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
            source: None,
        }
    }

    /// Create decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
            source: None,
        }
    }
}

/// Sink write errors
#[derive(Debug, Error)]
pub enum SinkError {
    /// The write was aborted because the surrounding context was canceled
    #[error("sink '{sink_name}' write canceled: {message}")]
    Canceled { sink_name: String, message: String },

    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    Write { sink_name: String, message: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    Connection { sink_name: String, message: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SinkError {
    /// Create canceled error
    pub fn canceled(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Canceled {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Write {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create sink connection error
    pub fn connection(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Whether the write was aborted by cancellation
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled { .. })
    }
}
