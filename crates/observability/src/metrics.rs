//! 代理指标收集模块
//!
//! 基于 `metrics` facade 的轻量记录层，句柄显式传给各个 worker。

use std::sync::Arc;

use metrics::{counter, gauge, histogram};

/// Counter of processed lines, labeled by pattern and node
pub const LOG_LINES_TOTAL: &str = "log_lines_total";
pub const FILE_ERRORS_TOTAL: &str = "tailer_file_errors_total";
pub const CURSOR_RESETS_TOTAL: &str = "tailer_cursor_resets_total";
pub const SCAN_DURATION_SECONDS: &str = "tailer_scan_duration_seconds";
pub const QUEUE_DEPTH: &str = "handoff_queue_depth";
pub const ENTRIES_DISPATCHED_TOTAL: &str = "entries_dispatched_total";

/// Outcome of one delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Success,
    Failure,
    Timeout,
}

impl DeliveryStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Timeout => "timeout",
        }
    }
}

/// Metrics recorder capability handed to the tailer and dispatcher
#[derive(Debug, Clone)]
pub struct AgentMetrics {
    node: Arc<str>,
}

impl AgentMetrics {
    pub fn new(node_name: impl Into<Arc<str>>) -> Self {
        Self {
            node: node_name.into(),
        }
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    /// Record lines emitted from files matched by `pattern`
    pub fn record_lines_collected(&self, pattern: &str, count: u64) {
        if count == 0 {
            return;
        }
        counter!(
            LOG_LINES_TOTAL,
            "log_file_name_pattern" => pattern.to_string(),
            "node" => self.node.to_string()
        )
        .increment(count);
    }

    /// Record a transient per-file failure (glob, open, stat, read)
    pub fn record_file_error(&self, kind: &'static str) {
        counter!(FILE_ERRORS_TOTAL, "kind" => kind).increment(1);
    }

    /// Record a cursor reset caused by rotation or truncation
    pub fn record_cursor_reset(&self, reason: &'static str) {
        counter!(CURSOR_RESETS_TOTAL, "reason" => reason).increment(1);
    }

    pub fn record_scan_duration(&self, seconds: f64) {
        histogram!(SCAN_DURATION_SECONDS).record(seconds);
    }

    pub fn record_queue_depth(&self, depth: usize) {
        gauge!(QUEUE_DEPTH).set(depth as f64);
    }

    /// Record one dispatcher delivery
    pub fn record_dispatch(&self, sink: &str, status: DeliveryStatus) {
        counter!(
            ENTRIES_DISPATCHED_TOTAL,
            "sink" => sink.to_string(),
            "status" => status.as_str()
        )
        .increment(1);
    }
}
