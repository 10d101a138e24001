//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Producer Daemon - batch and aggregate outbound messages into a sink
#[derive(Parser, Debug)]
#[command(
    name = "producer-daemon",
    author,
    version,
    about = "Outbound message batching daemon",
    long_about = "Buffers outbound messages, optionally folds them into aggregates, groups \n\
                  them into fixed-size batches and writes the batches to the configured \n\
                  sinks with a pool of output runners."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "PRODUCER_DAEMON_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "PRODUCER_DAEMON_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Feed input lines through the configured producer daemons
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "producers.toml",
        env = "PRODUCER_DAEMON_CONFIG"
    )]
    pub config: PathBuf,

    /// Only run the named producer (default: all configured producers)
    #[arg(short, long, env = "PRODUCER_DAEMON_PRODUCER")]
    pub producer: Option<String>,

    /// Read messages from this file, one per line (default: stdin)
    #[arg(short, long, env = "PRODUCER_DAEMON_INPUT")]
    pub input: Option<PathBuf>,

    /// Lines handed to a single `write` call
    #[arg(long, default_value = "1", env = "PRODUCER_DAEMON_LINES_PER_WRITE", value_parser = clap::value_parser!(u64).range(1..))]
    pub lines_per_write: u64,

    /// Stop feeding input after this many seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "PRODUCER_DAEMON_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", env = "PRODUCER_DAEMON_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "producers.toml", env = "PRODUCER_DAEMON_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "producers.toml", env = "PRODUCER_DAEMON_CONFIG")]
    pub config: PathBuf,

    /// Show daemon settings for each producer
    #[arg(long)]
    pub settings: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
