//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// `--producer` names a producer that is not configured
    #[error("Producer '{name}' is not configured (available: {available})")]
    ProducerNotFound { name: String, available: String },

    /// Input could not be opened or read
    #[error("Failed to read input {source_name}: {source}")]
    Input {
        source_name: String,
        #[source]
        source: std::io::Error,
    },

    /// Daemon construction or shutdown error
    #[error(transparent)]
    Daemon(#[from] contracts::DaemonError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn producer_not_found<'a>(
        name: impl Into<String>,
        available: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self::ProducerNotFound {
            name: name.into(),
            available: available.into_iter().collect::<Vec<_>>().join(", "),
        }
    }

    pub fn input(source_name: impl Into<String>, source: std::io::Error) -> Self {
        Self::Input {
            source_name: source_name.into(),
            source,
        }
    }
}
