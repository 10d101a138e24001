//! DaemonSettings - immutable producer daemon configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

use crate::{Attributes, DaemonError};

/// Producer daemon settings
///
/// Fixed at daemon construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DaemonSettings {
    /// Forced flush interval in milliseconds
    #[serde(default = "default_interval_ms")]
    #[validate(range(min = 1, message = "interval_ms must be >= 1"))]
    pub interval_ms: u64,

    /// Output channel capacity (batches)
    #[serde(default = "default_buffer_size")]
    #[validate(range(min = 1, message = "buffer_size must be >= 1"))]
    pub buffer_size: usize,

    /// Number of concurrent output runners
    #[serde(default = "default_runner_count")]
    #[validate(range(min = 1, message = "runner_count must be >= 1"))]
    pub runner_count: usize,

    /// Carrier messages per dispatched batch
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1, message = "batch_size must be >= 1"))]
    pub batch_size: usize,

    /// Raw messages folded into one aggregate (1 = aggregation disabled)
    #[serde(default = "default_aggregation_size")]
    #[validate(range(min = 1, message = "aggregation_size must be >= 1"))]
    pub aggregation_size: usize,

    /// Static attributes stamped onto every aggregate
    #[serde(default)]
    pub message_attributes: Attributes,
}

fn default_interval_ms() -> u64 {
    60_000
}

fn default_buffer_size() -> usize {
    10
}

fn default_runner_count() -> usize {
    10
}

fn default_batch_size() -> usize {
    10
}

fn default_aggregation_size() -> usize {
    1
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            buffer_size: default_buffer_size(),
            runner_count: default_runner_count(),
            batch_size: default_batch_size(),
            aggregation_size: default_aggregation_size(),
            message_attributes: Attributes::new(),
        }
    }
}

impl DaemonSettings {
    /// Forced flush interval
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Whether raw messages are folded into aggregates
    pub fn aggregation_enabled(&self) -> bool {
        self.aggregation_size > 1
    }

    /// Validate field ranges
    ///
    /// # Errors
    /// Returns a config error naming the first offending field (alphabetical).
    pub fn check(&self) -> Result<(), DaemonError> {
        self.validate().map_err(|errors| {
            let mut fields: Vec<_> = errors
                .field_errors()
                .into_iter()
                .map(|(field, errs)| (field.to_string(), errs))
                .collect();
            fields.sort_by(|a, b| a.0.cmp(&b.0));

            let Some((field, errs)) = fields.into_iter().next() else {
                return DaemonError::config_parse(errors.to_string());
            };
            let message = errs
                .first()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .unwrap_or_else(|| "invalid value".to_string());

            DaemonError::config_validation(field, message)
        })
    }
}
