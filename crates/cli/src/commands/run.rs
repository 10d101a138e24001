//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    // Load and parse configuration
    let producer_config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        producers = producer_config.producers.len(),
        selected = args.producer.as_deref().unwrap_or("*"),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&producer_config);
        return Ok(());
    }

    let pipeline_config = PipelineConfig {
        producer_config,
        producer: args.producer.clone(),
        input: args.input.clone(),
        lines_per_write: usize::try_from(args.lines_per_write).unwrap_or(usize::MAX),
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
        export_metrics: args.metrics_port != 0,
    };

    info!(
        input = %args
            .input
            .as_ref()
            .map_or_else(|| "stdin".to_string(), |p| p.display().to_string()),
        "Starting pipeline..."
    );

    let stats = Pipeline::new(pipeline_config)
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        lines_read = stats.lines_read,
        writes = stats.writes,
        duration_secs = stats.duration.as_secs_f64(),
        lines_per_sec = format!("{:.2}", stats.lines_per_sec()),
        "Pipeline completed"
    );
    stats.print_summary();

    if stats.batches_failed() > 0 {
        warn!(batches = stats.batches_failed(), "Some batches were not accepted by their sink");
    }
    if let Some(failure) = stats.failure {
        anyhow::bail!("Pipeline finished with errors: {failure}");
    }

    info!("Producer Daemon finished");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
///
/// A handler that can not be installed never resolves.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &contracts::ProducerConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Producers ({}):", config.producers.len());
    for producer in &config.producers {
        let d = &producer.daemon;
        println!(
            "  - {} -> {} ({:?}) batch={} aggregation={} interval={}ms runners={}",
            producer.name,
            producer.sink.name,
            producer.sink.sink_type,
            d.batch_size,
            d.aggregation_size,
            d.interval_ms,
            d.runner_count
        );
    }
    println!();
}
