//! Pipeline statistics and metrics.

use std::time::Duration;

use observability::MetricsSummary;
use producer_daemon::StatsSnapshot;

/// Final state of one producer daemon
#[derive(Debug, Clone)]
pub struct DaemonReport {
    pub name: String,
    pub sink: String,
    pub lifecycle: String,
    pub stats: StatsSnapshot,
}

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Input lines read
    pub lines_read: u64,

    /// `write` calls issued (one per line group per daemon)
    pub writes: u64,

    /// `write` calls that returned an error
    pub write_errors: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Per-daemon counters, sorted by name
    pub daemons: Vec<DaemonReport>,

    /// Metrics observed through the summary recorder
    pub metrics: MetricsSummary,

    /// First input or daemon failure, if any
    pub failure: Option<String>,
}

impl PipelineStats {
    /// Input lines per second
    pub fn lines_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.lines_read as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Batches lost to sink errors, across all daemons
    pub fn batches_failed(&self) -> u64 {
        self.daemons.iter().map(|d| d.stats.batches_failed).sum()
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Pipeline Statistics ===\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Lines read: {}", self.lines_read);
        println!("   ├─ Lines/s: {:.2}", self.lines_per_sec());
        println!("   ├─ Writes: {}", self.writes);
        println!("   └─ Write errors: {}", self.write_errors);

        for daemon in &self.daemons {
            let s = &daemon.stats;
            println!("\nProducer '{}' -> {} ({})", daemon.name, daemon.sink, daemon.lifecycle);
            println!("   ├─ Messages written: {}", s.messages_written);
            println!("   ├─ Aggregates folded: {}", s.aggregates_folded);
            println!("   ├─ Messages dropped: {}", s.messages_dropped);
            println!("   ├─ Batches dispatched: {}", s.batches_dispatched);
            println!("   ├─ Batches written: {}", s.batches_written);
            println!("   └─ Batches failed: {}", s.batches_failed);
        }

        println!("\n{}", self.metrics);

        if let Some(ref failure) = self.failure {
            println!("Failure: {}", failure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let stats = PipelineStats {
            lines_read: 100,
            duration: Duration::from_secs(4),
            daemons: vec![
                DaemonReport {
                    name: "a".to_string(),
                    sink: "log".to_string(),
                    lifecycle: "closed".to_string(),
                    stats: StatsSnapshot {
                        batches_failed: 2,
                        ..StatsSnapshot::default()
                    },
                },
                DaemonReport {
                    name: "b".to_string(),
                    sink: "log".to_string(),
                    lifecycle: "closed".to_string(),
                    stats: StatsSnapshot {
                        batches_failed: 1,
                        ..StatsSnapshot::default()
                    },
                },
            ],
            ..PipelineStats::default()
        };

        assert_eq!(stats.lines_per_sec(), 25.0);
        assert_eq!(stats.batches_failed(), 3);
        assert_eq!(PipelineStats::default().lines_per_sec(), 0.0);
    }
}
