//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{ProducerConfig, SinkType};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Flush intervals below this are legal but mostly flush half-empty batches
const SHORT_INTERVAL_MS: u64 = 10;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    producer_count: usize,
    aggregating_count: usize,
    runner_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    producer_count: config.producers.len(),
                    aggregating_count: config
                        .producers
                        .iter()
                        .filter(|p| p.daemon.aggregation_enabled())
                        .count(),
                    runner_count: config.producers.iter().map(|p| p.daemon.runner_count).sum(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &ProducerConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    for producer in &config.producers {
        let d = &producer.daemon;

        if producer.sink.sink_type == SinkType::Log {
            warnings.push(format!(
                "Producer '{}' uses a log sink - messages are only logged",
                producer.name
            ));
        }

        if d.interval_ms < SHORT_INTERVAL_MS {
            warnings.push(format!(
                "Producer '{}' flushes every {}ms - batches will rarely fill",
                producer.name, d.interval_ms
            ));
        }

        if d.runner_count > d.buffer_size {
            warnings.push(format!(
                "Producer '{}' has more runners ({}) than buffered batches ({})",
                producer.name, d.runner_count, d.buffer_size
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Producers: {}", summary.producer_count);
            println!("  Aggregating: {}", summary.aggregating_count);
            println!("  Output runners: {}", summary.runner_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
