//! 配置校验模块
//!
//! 校验规则：
//! - 至少一个 producer
//! - producer name 非空且唯一
//! - daemon 参数范围合法 (见 `DaemonSettings` 上的 validator 规则)
//! - sink 必填字段齐全 (file 需要 path，network 需要合法的 addr)

use std::collections::HashSet;
use std::net::SocketAddr;

use contracts::{DaemonError, ProducerConfig, ProducerEntry, SinkType};
use validator::Validate;

/// 校验 ProducerConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &ProducerConfig) -> Result<(), DaemonError> {
    if config.producers.is_empty() {
        return Err(DaemonError::config_validation(
            "producers",
            "at least one producer is required",
        ));
    }

    validate_producer_names(config)?;
    for producer in &config.producers {
        validate_daemon_settings(producer)?;
        validate_sink(producer)?;
    }
    Ok(())
}

/// 校验 producer name 非空且唯一
fn validate_producer_names(config: &ProducerConfig) -> Result<(), DaemonError> {
    let mut seen = HashSet::new();
    for (idx, producer) in config.producers.iter().enumerate() {
        if producer.name.trim().is_empty() {
            return Err(DaemonError::config_validation(
                format!("producers[{}].name", idx),
                "producer name cannot be empty",
            ));
        }
        if !seen.insert(&producer.name) {
            return Err(DaemonError::config_validation(
                format!("producers[name={}]", producer.name),
                "duplicate producer name",
            ));
        }
    }
    Ok(())
}

/// 校验 daemon 参数
fn validate_daemon_settings(producer: &ProducerEntry) -> Result<(), DaemonError> {
    let Err(errors) = producer.daemon.validate() else {
        return Ok(());
    };

    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    let (field, message) = fields
        .first()
        .map(|(field, errs)| {
            let message = errs
                .first()
                .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| "invalid value".to_string());
            (field.to_string(), message)
        })
        .unwrap_or_else(|| ("daemon".to_string(), errors.to_string()));

    Err(DaemonError::config_validation(
        format!("producers[{}].daemon.{}", producer.name, field),
        message,
    ))
}

/// 校验 sink 配置
fn validate_sink(producer: &ProducerEntry) -> Result<(), DaemonError> {
    let sink = &producer.sink;
    let path = |key: &str| format!("producers[{}].sink.{}", producer.name, key);

    if sink.name.trim().is_empty() {
        return Err(DaemonError::config_validation(
            path("name"),
            "sink name cannot be empty",
        ));
    }

    match sink.sink_type {
        SinkType::Log => {}
        SinkType::File => {
            if sink.params.get("path").is_none_or(|p| p.trim().is_empty()) {
                return Err(DaemonError::config_validation(
                    path("params.path"),
                    "file sink requires a 'path' parameter",
                ));
            }
        }
        SinkType::Network => {
            let addr = sink.params.get("addr").ok_or_else(|| {
                DaemonError::config_validation(
                    path("params.addr"),
                    "network sink requires an 'addr' parameter",
                )
            })?;
            if addr.parse::<SocketAddr>().is_err() {
                return Err(DaemonError::config_validation(
                    path("params.addr"),
                    format!("'{}' is not a socket address", addr),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ConfigVersion, DaemonSettings, SinkConfig};
    use std::collections::HashMap;

    fn entry(name: &str, sink_type: SinkType, params: &[(&str, &str)]) -> ProducerEntry {
        ProducerEntry {
            name: name.into(),
            daemon: DaemonSettings::default(),
            sink: SinkConfig {
                name: format!("{name}_sink"),
                sink_type,
                params: params
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<HashMap<_, _>>(),
            },
        }
    }

    fn minimal_config() -> ProducerConfig {
        ProducerConfig {
            version: ConfigVersion::V1,
            producers: vec![
                entry("events", SinkType::Log, &[]),
                entry("audit", SinkType::File, &[("path", "./out/audit.jsonl")]),
            ],
        }
    }

    #[test]
    fn test_valid_config() {
        let config = minimal_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_no_producers() {
        let config = ProducerConfig {
            version: ConfigVersion::V1,
            producers: Vec::new(),
        };
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("at least one producer"), "got: {err}");
    }

    #[test]
    fn test_duplicate_producer_name() {
        let mut config = minimal_config();
        config.producers.push(config.producers[0].clone());
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("duplicate producer name"), "got: {err}");
    }

    #[test]
    fn test_out_of_range_settings() {
        let mut config = minimal_config();
        config.producers[1].daemon.runner_count = 0;
        let err = validate(&config).unwrap_err().to_string();
        assert!(
            err.contains("producers[audit].daemon.runner_count"),
            "got: {err}"
        );
        assert!(err.contains("runner_count must be >= 1"), "got: {err}");
    }

    #[test]
    fn test_file_sink_requires_path() {
        let mut config = minimal_config();
        config.producers[1].sink.params.clear();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("requires a 'path'"), "got: {err}");
    }

    #[test]
    fn test_network_sink_requires_valid_addr() {
        let mut config = minimal_config();
        config
            .producers
            .push(entry("udp", SinkType::Network, &[("addr", "localhost")]));
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("not a socket address"), "got: {err}");
    }

    #[test]
    fn test_empty_sink_name() {
        let mut config = minimal_config();
        config.producers[0].sink.name = String::new();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("cannot be empty"), "got: {err}");
    }
}
