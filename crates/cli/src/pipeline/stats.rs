//! Pipeline statistics.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use tailer::TailerStats;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    /// Lines turned into entries by the tailer
    pub lines_read: u64,

    /// Scan ticks completed
    pub scans: u64,

    /// Files skipped for a tick because of open/stat/read errors
    pub file_errors: u64,

    /// Entries accepted by the sink
    pub delivered: u64,

    /// Sink writes that returned an error
    pub failed: u64,

    /// Entries dropped after a failed or timed-out write
    pub dropped: u64,

    /// Entries still queued at shutdown
    pub discarded: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,
}

impl PipelineStats {
    /// Combine worker outputs
    ///
    /// `tailer` is `None` when the tailer did not return its totals.
    pub fn collect(tailer: Option<&TailerStats>, dispatch: MetricsSnapshot, duration: Duration) -> Self {
        let tailer = tailer.cloned().unwrap_or_default();
        Self {
            lines_read: tailer.lines_emitted,
            scans: tailer.ticks,
            file_errors: tailer.errors,
            delivered: dispatch.write_count,
            failed: dispatch.failure_count,
            dropped: dispatch.dropped_count,
            discarded: dispatch.discarded_count,
            duration,
        }
    }

    /// Lines per second over the whole run
    pub fn lines_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.lines_read as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary to stderr
    pub fn print_summary(&self) {
        eprintln!("\n╔══════════════════════════════════════════════════════════════╗");
        eprintln!("║                     Pipeline Statistics                      ║");
        eprintln!("╚══════════════════════════════════════════════════════════════╝\n");

        eprintln!("📊 Collection");
        eprintln!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        eprintln!("   ├─ Scans: {}", self.scans);
        eprintln!("   ├─ Lines read: {}", self.lines_read);
        eprintln!("   ├─ Lines/s: {:.2}", self.lines_per_sec());
        eprintln!("   └─ File errors: {}", self.file_errors);

        eprintln!("\n📤 Delivery");
        eprintln!("   ├─ Delivered: {}", self.delivered);
        eprintln!("   ├─ Failed writes: {}", self.failed);
        eprintln!("   ├─ Dropped: {}", self.dropped);
        eprintln!("   └─ Discarded at shutdown: {}", self.discarded);

        eprintln!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_without_tailer_totals() {
        let dispatch = MetricsSnapshot {
            write_count: 4,
            dropped_count: 1,
            ..Default::default()
        };
        let stats = PipelineStats::collect(None, dispatch, Duration::from_secs(2));
        assert_eq!(stats.lines_read, 0);
        assert_eq!(stats.delivered, 4);
        assert_eq!(stats.dropped, 1);
    }

    #[test]
    fn test_lines_per_sec() {
        let tailer = TailerStats {
            lines_emitted: 10,
            ..Default::default()
        };
        let stats =
            PipelineStats::collect(Some(&tailer), MetricsSnapshot::default(), Duration::from_secs(4));
        assert_eq!(stats.lines_per_sec(), 2.5);
        assert_eq!(
            PipelineStats::default().lines_per_sec(),
            0.0,
            "zero duration must not divide"
        );
    }
}
