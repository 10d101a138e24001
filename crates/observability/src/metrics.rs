//! Producer daemon 指标模块
//!
//! 两种 [`MetricRecorder`] 实现：
//! - [`FacadeMetricRecorder`]：转发到 `metrics` facade (Prometheus 等)
//! - [`SummaryRecorder`]：在内存中聚合，便于输出摘要和测试断言

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{MetricDatum, MetricRecorder, MetricUnit};
use metrics::{counter, histogram, Label};

/// 指标名前缀
pub const METRIC_PREFIX: &str = "producer_daemon";

/// 转发到 `metrics` facade
///
/// `Count` 映射为 counter，平均值类单位映射为 histogram；dimensions 作为 labels。
#[derive(Debug, Clone, Default)]
pub struct FacadeMetricRecorder;

impl FacadeMetricRecorder {
    pub fn new() -> Self {
        Self
    }

    /// `BatchSize` -> `producer_daemon_batch_size`
    pub fn metric_name(name: &str) -> String {
        let mut out = String::with_capacity(METRIC_PREFIX.len() + name.len() + 4);
        out.push_str(METRIC_PREFIX);
        for (idx, ch) in name.chars().enumerate() {
            if ch.is_uppercase() || idx == 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        }
        if name.ends_with("Duration") {
            out.push_str("_ms");
        }
        out
    }
}

impl MetricRecorder for FacadeMetricRecorder {
    fn record(&self, datum: MetricDatum) {
        let name = Self::metric_name(&datum.name);
        let labels: Vec<Label> = datum
            .dimensions
            .iter()
            .map(|(k, v)| Label::new(k.clone(), v.clone()))
            .collect();

        match datum.unit {
            MetricUnit::Count => counter!(name, labels).increment(datum.value.max(0.0) as u64),
            MetricUnit::CountAverage | MetricUnit::MillisecondsAverage => {
                histogram!(name, labels).record(datum.value)
            }
        }
    }
}

/// 转发到多个 recorder
#[derive(Clone, Default)]
pub struct CompositeRecorder {
    recorders: Vec<Arc<dyn MetricRecorder>>,
}

impl CompositeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, recorder: Arc<dyn MetricRecorder>) -> Self {
        self.recorders.push(recorder);
        self
    }
}

impl MetricRecorder for CompositeRecorder {
    fn record(&self, datum: MetricDatum) {
        if let Some((last, rest)) = self.recorders.split_last() {
            for recorder in rest {
                recorder.record(datum.clone());
            }
            last.record(datum);
        }
    }
}

/// 内存聚合 recorder
///
/// 按 `<dimension values>/<metric name>` 分组统计。
#[derive(Debug, Default)]
pub struct SummaryRecorder {
    stats: Mutex<BTreeMap<String, RunningStats>>,
}

impl SummaryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn stats(&self) -> MutexGuard<'_, BTreeMap<String, RunningStats>> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 分组键，例如 `events/BatchSize`
    pub fn key(datum: &MetricDatum) -> String {
        if datum.dimensions.is_empty() {
            return datum.name.clone();
        }
        let dims: Vec<&str> = datum.dimensions.values().map(String::as_str).collect();
        format!("{}/{}", dims.join(","), datum.name)
    }

    /// 单个分组的统计摘要
    pub fn get(&self, key: &str) -> Option<StatsSummary> {
        self.stats().get(key).map(StatsSummary::from)
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            metrics: self
                .stats()
                .iter()
                .map(|(k, v)| (k.clone(), StatsSummary::from(v)))
                .collect(),
        }
    }

    /// 重置统计
    pub fn reset(&self) {
        self.stats().clear();
    }
}

impl MetricRecorder for SummaryRecorder {
    fn record(&self, datum: MetricDatum) {
        let key = Self::key(&datum);
        self.stats().entry(key).or_default().push(datum.value);
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub metrics: BTreeMap<String, StatsSummary>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Producer Metrics Summary ===")?;
        if self.metrics.is_empty() {
            return writeln!(f, "(no metrics recorded)");
        }
        for (key, stats) in &self.metrics {
            writeln!(f, "{}: {}", key, stats)?;
        }
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            sum: stats.sum,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "sum={:.0}, min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.sum, self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    sum: f64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 总和
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}
