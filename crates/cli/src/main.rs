//! # Producer Daemon CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 按配置构建 producer daemon，并把输入行写入其中
//! - 优雅关闭处理 (EOF / 超时 / Ctrl+C)

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_pipeline, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging based on CLI options
    observability::init_with_config(observability_config(&cli))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Producer Daemon CLI starting"
    );

    // Execute command
    let result = match &cli.command {
        Commands::Run(args) => run_pipeline(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Map CLI options onto the observability setup
fn observability_config(cli: &Cli) -> ObservabilityConfig {
    let default_log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let metrics_port = match &cli.command {
        Commands::Run(args) if args.metrics_port != 0 && !args.dry_run => Some(args.metrics_port),
        _ => None,
    };

    ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port,
        default_log_level: default_log_level.to_string(),
    }
}
