//! ProducerConfig - Config Loader 输出
//!
//! 描述一组具名的 producer daemon：缓冲/聚合参数与下游 sink 路由。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::DaemonSettings;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的 producer 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 具名 producer 列表
    pub producers: Vec<ProducerEntry>,
}

impl ProducerConfig {
    /// 按名称查找 producer
    pub fn producer(&self, name: &str) -> Option<&ProducerEntry> {
        self.producers.iter().find(|p| p.name == name)
    }
}

/// 单个 producer daemon 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerEntry {
    /// 唯一标识符
    pub name: String,

    /// Daemon 参数
    #[serde(default)]
    pub daemon: DaemonSettings,

    /// 下游 sink
    pub sink: SinkConfig,
}

/// Sink 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink 名称
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 日志输出
    Log,
    /// 文件输出 (JSON lines)
    File,
    /// 网络输出 (UDP)
    Network,
}
