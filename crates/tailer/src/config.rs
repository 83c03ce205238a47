//! Tailer configuration and statistics

use std::time::Duration;

use contracts::{CollectionConfig, StartPosition};

/// Tailer configuration
#[derive(Debug, Clone)]
pub struct TailerConfig {
    /// Glob patterns expanded on every tick
    pub patterns: Vec<String>,

    /// Tick interval
    pub interval: Duration,

    /// Max lines emitted per file per tick
    pub batch_size: usize,

    /// Max message length in bytes
    pub max_line_length: usize,

    /// First read position for newly discovered files
    pub start_at: StartPosition,

    /// Warning period while blocked on a full queue
    pub enqueue_warn_after: Duration,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            interval: Duration::from_secs(1),
            batch_size: 100,
            max_line_length: 16 * 1024,
            start_at: StartPosition::Beginning,
            enqueue_warn_after: Duration::from_secs(5),
        }
    }
}

impl From<&CollectionConfig> for TailerConfig {
    fn from(config: &CollectionConfig) -> Self {
        Self {
            patterns: config.log_paths.clone(),
            interval: config.interval(),
            batch_size: config.batch_size,
            max_line_length: config.max_line_length,
            start_at: config.start_at,
            enqueue_warn_after: config.enqueue_warn_after(),
        }
    }
}

/// Outcome of a single scan tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Files that were opened and checked
    pub files_scanned: u64,

    /// Entries handed to the queue
    pub lines_emitted: u64,

    /// Transient failures (glob, open, stat, read)
    pub errors: u64,

    /// Cursors reset by rotation or truncation
    pub cursor_resets: u64,

    /// Scan stopped early because of cancellation
    pub interrupted: bool,
}

/// Totals over the tailer lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailerStats {
    pub ticks: u64,
    pub files_scanned: u64,
    pub lines_emitted: u64,
    pub errors: u64,
    pub cursor_resets: u64,
}

impl TailerStats {
    pub fn absorb(&mut self, report: &ScanReport) {
        self.ticks += 1;
        self.files_scanned += report.files_scanned;
        self.lines_emitted += report.lines_emitted;
        self.errors += report.errors;
        self.cursor_resets += report.cursor_resets;
    }
}
