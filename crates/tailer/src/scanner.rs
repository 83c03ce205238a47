//! Tailer main loop

use std::collections::HashSet;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_channel::{Sender, TrySendError};
use contracts::{LogEntry, LogLevel};
use observability::AgentMetrics;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, BufReader};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{ScanReport, TailerConfig, TailerStats};
use crate::cursor::{CursorStore, FileCursor, FileIdentity};
use crate::error::{FileError, Result, TailerError};
use crate::reader::read_batch;

/// Whether an emit step ran to the end or was cut short by cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emit {
    Completed,
    Cancelled,
}

/// Periodic file scanner
///
/// Expands the configured glob patterns on every tick, reads at most
/// `batch_size` new lines per file and hands them to the queue. The cursor
/// map is owned here and never shared.
pub struct Tailer {
    config: TailerConfig,
    node_name: Arc<str>,
    sender: Sender<LogEntry>,
    metrics: AgentMetrics,
    cursors: CursorStore,
}

impl Tailer {
    /// Create a tailer feeding `sender`
    ///
    /// # Errors
    /// `InvalidConfig` on an empty node name, no patterns, or a zero
    /// interval / batch size / line length.
    pub fn new(
        config: TailerConfig,
        node_name: impl Into<Arc<str>>,
        sender: Sender<LogEntry>,
        metrics: AgentMetrics,
    ) -> Result<Self> {
        let node_name = node_name.into();

        if node_name.is_empty() {
            return Err(TailerError::invalid_config("node name is empty"));
        }
        if config.patterns.is_empty() {
            return Err(TailerError::invalid_config("no log path patterns"));
        }
        if config.interval.is_zero() {
            return Err(TailerError::invalid_config("interval must be > 0"));
        }
        if config.batch_size == 0 {
            return Err(TailerError::invalid_config("batch_size must be > 0"));
        }
        if config.max_line_length == 0 {
            return Err(TailerError::invalid_config("max_line_length must be > 0"));
        }

        Ok(Self {
            config,
            node_name,
            sender,
            metrics,
            cursors: CursorStore::new(),
        })
    }

    /// Cursor currently recorded for `path`
    pub fn cursor(&self, path: &Path) -> Option<&FileCursor> {
        self.cursors.get(path)
    }

    /// Number of tracked files
    pub fn tracked_files(&self) -> usize {
        self.cursors.len()
    }

    /// Scan on every tick until cancelled
    ///
    /// # Errors
    /// `QueueClosed` when the consumer side of the queue is gone.
    #[instrument(name = "tailer_run", skip_all, fields(node = %self.node_name))]
    pub async fn run(mut self, cancel: CancellationToken) -> Result<TailerStats> {
        info!(
            patterns = ?self.config.patterns,
            interval_ms = self.config.interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            "Tailer started"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats = TailerStats::default();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.scan(&cancel).await?;
                    stats.absorb(&report);
                    if report.interrupted {
                        break;
                    }
                }
            }
        }

        info!(
            ticks = stats.ticks,
            lines_emitted = stats.lines_emitted,
            errors = stats.errors,
            "Tailer stopped"
        );
        Ok(stats)
    }

    /// Run one scan over every pattern
    ///
    /// Per-file failures are logged and counted in the report; the file is
    /// retried on the next tick.
    ///
    /// # Errors
    /// `QueueClosed` when the consumer side of the queue is gone.
    #[instrument(name = "tailer_scan", skip_all)]
    pub async fn scan(&mut self, cancel: &CancellationToken) -> Result<ScanReport> {
        let started = Instant::now();
        let mut report = ScanReport::default();
        let mut seen = HashSet::new();
        let patterns = self.config.patterns.clone();

        'patterns: for pattern in &patterns {
            let paths = match expand_pattern(pattern).await {
                Ok(paths) => paths,
                Err(message) => {
                    warn!(pattern = %pattern, error = %message, "Skipping log path pattern");
                    report.errors += 1;
                    self.metrics.record_file_error("glob");
                    continue;
                }
            };

            for path in paths {
                if cancel.is_cancelled() {
                    report.interrupted = true;
                    break 'patterns;
                }
                // Already handled through an earlier pattern
                if !seen.insert(path.clone()) {
                    continue;
                }
                if self.tail_file(&path, pattern, cancel, &mut report).await? == Emit::Cancelled {
                    report.interrupted = true;
                    break 'patterns;
                }
            }
        }

        if !report.interrupted {
            let pruned = self.cursors.retain_seen(&seen);
            if pruned > 0 {
                debug!(pruned, "Dropped cursors of vanished files");
            }
        }

        self.metrics
            .record_scan_duration(started.elapsed().as_secs_f64());
        self.metrics.record_queue_depth(self.sender.len());

        debug!(
            files = report.files_scanned,
            lines = report.lines_emitted,
            errors = report.errors,
            "Scan finished"
        );
        Ok(report)
    }

    /// Read new lines of one file and enqueue them
    async fn tail_file(
        &mut self,
        path: &Path,
        pattern: &str,
        cancel: &CancellationToken,
        report: &mut ScanReport,
    ) -> Result<Emit> {
        let file = match File::open(path).await {
            Ok(file) => file,
            Err(source) => {
                self.file_error(
                    report,
                    FileError::Open {
                        path: path.to_path_buf(),
                        source,
                    },
                );
                return Ok(Emit::Completed);
            }
        };

        let metadata = match file.metadata().await {
            Ok(metadata) => metadata,
            Err(source) => {
                self.file_error(
                    report,
                    FileError::Stat {
                        path: path.to_path_buf(),
                        source,
                    },
                );
                return Ok(Emit::Completed);
            }
        };

        if !metadata.is_file() {
            return Ok(Emit::Completed);
        }
        report.files_scanned += 1;

        let observation = self.cursors.observe(
            path,
            FileIdentity::from_metadata(&metadata),
            metadata.len(),
            self.config.start_at,
        );

        if let Some(reason) = observation.reset {
            info!(
                path = %path.display(),
                reason = reason.as_str(),
                size = observation.size,
                "Log file replaced, reading from the start"
            );
            report.cursor_resets += 1;
            self.metrics.record_cursor_reset(reason.as_str());
        }

        if !observation.has_new_data() {
            return Ok(Emit::Completed);
        }

        let mut reader = BufReader::new(file);
        if let Err(source) = reader.seek(SeekFrom::Start(observation.offset)).await {
            self.file_error(
                report,
                FileError::Read {
                    path: path.to_path_buf(),
                    offset: observation.offset,
                    source,
                },
            );
            return Ok(Emit::Completed);
        }

        let batch = read_batch(
            &mut reader,
            observation.offset,
            self.config.batch_size,
            self.config.max_line_length,
        )
        .await;
        // Handle is released before a possibly long wait on the queue
        drop(reader);

        let source: Arc<str> = Arc::from(path.to_string_lossy().as_ref());
        let mut emitted = 0u64;
        let mut outcome = Emit::Completed;

        for line in batch.lines {
            let end_offset = line.end_offset;
            match LogEntry::new(
                self.node_name.clone(),
                source.clone(),
                line.message,
                LogLevel::default(),
                line.truncated,
            ) {
                Ok(entry) => {
                    if self.enqueue(entry, cancel).await? == Emit::Cancelled {
                        outcome = Emit::Cancelled;
                        break;
                    }
                    emitted += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unusable line"),
            }
            self.cursors.advance(path, end_offset);
        }

        report.lines_emitted += emitted;
        self.metrics.record_lines_collected(pattern, emitted);

        if outcome == Emit::Completed {
            if let Some(source) = batch.error {
                let offset = self.cursors.get(path).map_or(0, |c| c.offset);
                self.file_error(
                    report,
                    FileError::Read {
                        path: path.to_path_buf(),
                        offset,
                        source,
                    },
                );
            }
        }

        Ok(outcome)
    }

    /// The consumer may drop the queue first during shutdown
    fn closed(&self, cancel: &CancellationToken) -> Result<Emit> {
        if cancel.is_cancelled() {
            Ok(Emit::Cancelled)
        } else {
            Err(TailerError::QueueClosed)
        }
    }

    /// Hand one entry to the queue, waiting for space
    async fn enqueue(&self, entry: LogEntry, cancel: &CancellationToken) -> Result<Emit> {
        let entry = match self.sender.try_send(entry) {
            Ok(()) => return Ok(Emit::Completed),
            Err(TrySendError::Closed(_)) => return self.closed(cancel),
            Err(TrySendError::Full(entry)) => entry,
        };

        let warn_after = self.config.enqueue_warn_after;
        let started = Instant::now();
        let mut warn_timer =
            tokio::time::interval_at(tokio::time::Instant::now() + warn_after, warn_after);
        let send = self.sender.send(entry);
        tokio::pin!(send);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(Emit::Cancelled),
                result = &mut send => {
                    return match result {
                        Ok(()) => Ok(Emit::Completed),
                        Err(_) => self.closed(cancel),
                    };
                }
                _ = warn_timer.tick() => {
                    warn!(
                        waited_ms = started.elapsed().as_millis() as u64,
                        capacity = ?self.sender.capacity(),
                        "Hand-off queue full, tailer is waiting"
                    );
                }
            }
        }
    }

    fn file_error(&self, report: &mut ScanReport, error: FileError) {
        warn!(error = %error, "Log file skipped until next tick");
        report.errors += 1;
        self.metrics.record_file_error(error.kind());
    }
}

/// Expand a glob pattern off the async runtime
async fn expand_pattern(pattern: &str) -> std::result::Result<Vec<PathBuf>, String> {
    let pattern = pattern.to_string();
    tokio::task::spawn_blocking(move || -> std::result::Result<Vec<PathBuf>, String> {
        let paths = glob::glob(&pattern).map_err(|e| e.to_string())?;
        Ok(paths
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    debug!(error = %e, "Unreadable path while expanding pattern");
                    None
                }
            })
            .collect())
    })
    .await
    .map_err(|e| e.to_string())?
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_channel::{bounded, Receiver};
    use contracts::StartPosition;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config_for(dir: &TempDir, batch_size: usize, max_line_length: usize) -> TailerConfig {
        TailerConfig {
            patterns: vec![format!("{}/*.log", dir.path().display())],
            interval: Duration::from_millis(20),
            batch_size,
            max_line_length,
            start_at: StartPosition::Beginning,
            enqueue_warn_after: Duration::from_millis(50),
        }
    }

    fn tailer_with(config: TailerConfig, capacity: usize) -> (Tailer, Receiver<LogEntry>) {
        let (tx, rx) = bounded(capacity);
        let tailer = Tailer::new(config, "node-1", tx, AgentMetrics::new("node-1")).unwrap();
        (tailer, rx)
    }

    fn drain(rx: &Receiver<LogEntry>) -> Vec<LogEntry> {
        let mut out = Vec::new();
        while let Ok(entry) = rx.try_recv() {
            out.push(entry);
        }
        out
    }

    fn messages(entries: &[LogEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.message()).collect()
    }

    fn append(path: &Path, content: &str) {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_new_rejects_invalid_settings() {
        let (tx, _rx) = bounded(1);
        let metrics = AgentMetrics::new("node-1");

        let result = Tailer::new(TailerConfig::default(), "node-1", tx.clone(), metrics.clone());
        assert!(matches!(result, Err(TailerError::InvalidConfig { .. })));

        let config = TailerConfig {
            patterns: vec!["/logs/*.log".into()],
            ..Default::default()
        };
        let result = Tailer::new(config.clone(), "", tx.clone(), metrics.clone());
        assert!(result.is_err());

        let zero_batch = TailerConfig {
            batch_size: 0,
            ..config
        };
        assert!(Tailer::new(zero_batch, "node-1", tx, metrics).is_err());
    }

    #[tokio::test]
    async fn test_first_scan_emits_all_files_in_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.log"), "x\ny\n").unwrap();
        std::fs::write(dir.path().join("b.log"), "z\n").unwrap();

        let (mut tailer, rx) = tailer_with(config_for(&dir, 10, 100), 100);
        let report = tailer.scan(&CancellationToken::new()).await.unwrap();

        let entries = drain(&rx);
        assert_eq!(entries.len(), 3);
        assert_eq!(report.lines_emitted, 3);
        assert_eq!(report.files_scanned, 2);

        let a = dir.path().join("a.log").to_string_lossy().into_owned();
        let b = dir.path().join("b.log").to_string_lossy().into_owned();
        let from_a: Vec<_> = entries.iter().filter(|e| e.source() == a).map(|e| e.message()).collect();
        let from_b: Vec<_> = entries.iter().filter(|e| e.source() == b).map(|e| e.message()).collect();
        assert_eq!(from_a, vec!["x", "y"]);
        assert_eq!(from_b, vec!["z"]);

        assert!(entries.iter().all(|e| e.node_name() == "node-1"));
        assert!(entries.iter().all(|e| e.level() == LogLevel::Info));
    }

    #[tokio::test]
    async fn test_batch_size_caps_lines_per_tick() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.log"), "1\n2\n3\n4\n5\n").unwrap();

        let (mut tailer, rx) = tailer_with(config_for(&dir, 2, 100), 100);
        let cancel = CancellationToken::new();

        tailer.scan(&cancel).await.unwrap();
        assert_eq!(messages(&drain(&rx)), vec!["1", "2"]);

        tailer.scan(&cancel).await.unwrap();
        assert_eq!(messages(&drain(&rx)), vec!["3", "4"]);

        tailer.scan(&cancel).await.unwrap();
        assert_eq!(messages(&drain(&rx)), vec!["5"]);
    }

    #[tokio::test]
    async fn test_repeated_ticks_emit_no_duplicates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "a\n").unwrap();

        let (mut tailer, rx) = tailer_with(config_for(&dir, 10, 100), 100);
        let cancel = CancellationToken::new();

        tailer.scan(&cancel).await.unwrap();
        assert_eq!(drain(&rx).len(), 1);

        for _ in 0..3 {
            let report = tailer.scan(&cancel).await.unwrap();
            assert_eq!(report.lines_emitted, 0);
        }
        assert!(drain(&rx).is_empty());

        append(&path, "b\n");
        tailer.scan(&cancel).await.unwrap();
        assert_eq!(messages(&drain(&rx)), vec!["b"]);
        assert_eq!(tailer.cursor(&path).unwrap().offset, 4);
    }

    #[tokio::test]
    async fn test_truncated_file_is_reread_from_start() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "one\ntwo\n").unwrap();

        let (mut tailer, rx) = tailer_with(config_for(&dir, 10, 100), 100);
        let cancel = CancellationToken::new();
        tailer.scan(&cancel).await.unwrap();
        drain(&rx);

        std::fs::write(&path, "3\n").unwrap();
        let report = tailer.scan(&cancel).await.unwrap();
        assert_eq!(report.cursor_resets, 1);
        assert_eq!(messages(&drain(&rx)), vec!["3"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rotated_file_is_read_from_start() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "old\n").unwrap();

        let (mut tailer, rx) = tailer_with(config_for(&dir, 10, 100), 100);
        let cancel = CancellationToken::new();
        tailer.scan(&cancel).await.unwrap();
        drain(&rx);

        // New file swapped in under the same name, larger than the old offset
        let staging = dir.path().join("staging.tmp");
        std::fs::write(&staging, "new-1\nnew-2\n").unwrap();
        std::fs::rename(&staging, &path).unwrap();

        let report = tailer.scan(&cancel).await.unwrap();
        assert_eq!(report.cursor_resets, 1);
        assert_eq!(messages(&drain(&rx)), vec!["new-1", "new-2"]);
    }

    #[tokio::test]
    async fn test_long_lines_are_truncated() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.log"), "abcdefgh\nabc\n").unwrap();

        let (mut tailer, rx) = tailer_with(config_for(&dir, 10, 5), 100);
        tailer.scan(&CancellationToken::new()).await.unwrap();

        let entries = drain(&rx);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message(), "abcde");
        assert!(entries[0].is_truncated());
        assert_eq!(entries[0].display_message(), "abcde [truncated]");
        assert_eq!(entries[1].message(), "abc");
        assert!(!entries[1].is_truncated());
    }

    #[tokio::test]
    async fn test_partial_line_waits_for_terminator() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "a\npart").unwrap();

        let (mut tailer, rx) = tailer_with(config_for(&dir, 10, 100), 100);
        let cancel = CancellationToken::new();

        tailer.scan(&cancel).await.unwrap();
        assert_eq!(messages(&drain(&rx)), vec!["a"]);

        append(&path, "ial\n");
        tailer.scan(&cancel).await.unwrap();
        assert_eq!(messages(&drain(&rx)), vec!["partial"]);
    }

    #[tokio::test]
    async fn test_start_at_end_skips_existing_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "old\n").unwrap();

        let config = TailerConfig {
            start_at: StartPosition::End,
            ..config_for(&dir, 10, 100)
        };
        let (mut tailer, rx) = tailer_with(config, 100);
        let cancel = CancellationToken::new();

        tailer.scan(&cancel).await.unwrap();
        assert!(drain(&rx).is_empty());

        append(&path, "new\n");
        tailer.scan(&cancel).await.unwrap();
        assert_eq!(messages(&drain(&rx)), vec!["new"]);
    }

    #[tokio::test]
    async fn test_malformed_pattern_is_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.log"), "x\n").unwrap();

        let mut config = config_for(&dir, 10, 100);
        config.patterns.insert(0, "[".to_string());
        let (mut tailer, rx) = tailer_with(config, 100);

        let report = tailer.scan(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.errors, 1);
        assert_eq!(messages(&drain(&rx)), vec!["x"]);
    }

    #[tokio::test]
    async fn test_vanished_files_are_pruned() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "x\n").unwrap();

        let (mut tailer, _rx) = tailer_with(config_for(&dir, 10, 100), 100);
        let cancel = CancellationToken::new();
        tailer.scan(&cancel).await.unwrap();
        assert_eq!(tailer.tracked_files(), 1);

        std::fs::remove_file(&path).unwrap();
        tailer.scan(&cancel).await.unwrap();
        assert_eq!(tailer.tracked_files(), 0);
    }

    #[tokio::test]
    async fn test_full_queue_blocks_until_cancelled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "1\n2\n3\n").unwrap();

        let (mut tailer, rx) = tailer_with(config_for(&dir, 10, 100), 2);
        let cancel = CancellationToken::new();

        let scan_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let report = tailer.scan(&scan_cancel).await;
            (tailer, report)
        });

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!task.is_finished(), "third enqueue should be blocked");
        assert_eq!(rx.len(), 2);

        cancel.cancel();
        let (mut tailer, report) = task.await.unwrap();
        let report = report.unwrap();
        assert!(report.interrupted);
        assert_eq!(report.lines_emitted, 2);
        // Cursor sits right after the second line
        assert_eq!(tailer.cursor(&path).unwrap().offset, 4);

        assert_eq!(messages(&drain(&rx)), vec!["1", "2"]);
        tailer.scan(&CancellationToken::new()).await.unwrap();
        assert_eq!(messages(&drain(&rx)), vec!["3"]);
    }

    #[tokio::test]
    async fn test_closed_queue_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.log"), "x\n").unwrap();

        let (mut tailer, rx) = tailer_with(config_for(&dir, 10, 100), 10);
        drop(rx);

        let result = tailer.scan(&CancellationToken::new()).await;
        assert!(matches!(result, Err(TailerError::QueueClosed)));
    }

    #[tokio::test]
    async fn test_run_follows_appends_until_cancelled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "first\n").unwrap();

        let (tailer, rx) = tailer_with(config_for(&dir, 10, 100), 100);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(tailer.run(cancel.clone()));

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.message(), "first");

        append(&path, "second\n");
        let second = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.message(), "second");

        cancel.cancel();
        let stats = task.await.unwrap().unwrap();
        assert_eq!(stats.lines_emitted, 2);
        assert!(stats.ticks >= 2);
    }

    #[tokio::test]
    async fn test_run_returns_immediately_when_cancelled() {
        let dir = TempDir::new().unwrap();
        let (tailer, _rx) = tailer_with(config_for(&dir, 10, 100), 1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let stats = tokio::time::timeout(Duration::from_secs(1), tailer.run(cancel))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.ticks, 0);
    }

    #[test]
    fn test_scan_counts_lines_per_pattern_and_node() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("app.log"), "first\nsecond\n").unwrap();
        let config = config_for(&dir, 10, 100);
        let pattern = config.patterns[0].clone();

        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let (mut tailer, rx) = tailer_with(config, 10);
                tailer.scan(&CancellationToken::new()).await.unwrap();
                assert_eq!(drain(&rx).len(), 2);
            });
        });

        let rendered = handle.render();
        let expected =
            format!(r#"log_lines_total{{log_file_name_pattern="{pattern}",node="node-1"}} 2"#);
        assert!(rendered.contains(&expected), "{rendered}");
    }
}
