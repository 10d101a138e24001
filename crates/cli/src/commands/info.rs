//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::ProducerConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    producers: Vec<ProducerInfo>,
}

#[derive(Serialize)]
struct ProducerInfo {
    name: String,
    sink: SinkInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    settings: Option<SettingsInfo>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    params: Vec<String>,
}

#[derive(Serialize)]
struct SettingsInfo {
    interval_ms: u64,
    buffer_size: usize,
    runner_count: usize,
    batch_size: usize,
    aggregation_size: usize,
    message_attributes: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&config, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn sorted_keys<'a, V>(map: impl IntoIterator<Item = (&'a String, V)>) -> Vec<String> {
    let mut keys: Vec<String> = map.into_iter().map(|(k, _)| k.clone()).collect();
    keys.sort();
    keys
}

fn build_config_info(config: &ProducerConfig, args: &InfoArgs) -> ConfigInfo {
    let producers = config
        .producers
        .iter()
        .map(|p| ProducerInfo {
            name: p.name.clone(),
            sink: SinkInfo {
                name: p.sink.name.clone(),
                sink_type: format!("{:?}", p.sink.sink_type),
                params: {
                    let mut params: Vec<String> =
                        p.sink.params.iter().map(|(k, v)| format!("{k}={v}")).collect();
                    params.sort();
                    params
                },
            },
            settings: args.settings.then(|| SettingsInfo {
                interval_ms: p.daemon.interval_ms,
                buffer_size: p.daemon.buffer_size,
                runner_count: p.daemon.runner_count,
                batch_size: p.daemon.batch_size,
                aggregation_size: p.daemon.aggregation_size,
                message_attributes: sorted_keys(&p.daemon.message_attributes),
            }),
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", config.version),
        producers,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("=== Producer Daemon Configuration ===\n");
    println!("Version: {}", info.version);
    println!("\nProducers ({})", info.producers.len());

    for (i, producer) in info.producers.iter().enumerate() {
        let is_last = i == info.producers.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child = if is_last { "   " } else { "│  " };

        println!("   {} {}", prefix, producer.name);
        println!(
            "   {}  ├─ Sink: {} ({})",
            child, producer.sink.name, producer.sink.sink_type
        );
        if !producer.sink.params.is_empty() {
            println!("   {}  │  └─ {}", child, producer.sink.params.join(", "));
        }

        match &producer.settings {
            Some(s) => {
                println!("   {}  └─ Settings", child);
                println!("   {}     ├─ interval: {}ms", child, s.interval_ms);
                println!("   {}     ├─ buffer: {} batches", child, s.buffer_size);
                println!("   {}     ├─ runners: {}", child, s.runner_count);
                println!("   {}     ├─ batch size: {}", child, s.batch_size);
                println!("   {}     ├─ aggregation size: {}", child, s.aggregation_size);
                println!(
                    "   {}     └─ attributes: {}",
                    child,
                    if s.message_attributes.is_empty() {
                        "-".to_string()
                    } else {
                        s.message_attributes.join(", ")
                    }
                );
            }
            None => println!("   {}  └─ (use --settings for daemon settings)", child),
        }
    }
}
