//! Dispatcher - drains the hand-off queue into the active sink

use std::sync::Arc;
use std::time::Duration;

use async_channel::Receiver;
use contracts::{DataSink, DispatchConfig, LogEntry};
use observability::{AgentMetrics, DeliveryStatus};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::DispatcherError;
use crate::metrics::{DispatchMetrics, MetricsSnapshot};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Upper bound for a single sink write
    pub delivery_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            delivery_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&DispatchConfig> for DispatcherConfig {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            delivery_timeout: config.delivery_timeout(),
        }
    }
}

/// Single-sink consumer of the hand-off queue
///
/// The sink type is fixed at construction, so the hot loop is monomorphized.
pub struct Dispatcher<S> {
    sink: S,
    sink_name: String,
    input_rx: Receiver<LogEntry>,
    config: DispatcherConfig,
    metrics: Arc<DispatchMetrics>,
    recorder: AgentMetrics,
}

impl<S: DataSink> Dispatcher<S> {
    pub fn new(
        sink: S,
        input_rx: Receiver<LogEntry>,
        config: DispatcherConfig,
        recorder: AgentMetrics,
    ) -> Self {
        let sink_name = sink.name().to_string();
        Self {
            sink,
            sink_name,
            input_rx,
            config,
            metrics: Arc::new(DispatchMetrics::new()),
            recorder,
        }
    }

    pub fn sink_name(&self) -> &str {
        &self.sink_name
    }

    /// Shared counters, readable while the dispatcher runs
    pub fn metrics(&self) -> Arc<DispatchMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run the dispatcher main loop
    ///
    /// Returns on cancellation or when every producer is gone. Entries still
    /// queued at that point are discarded; the sink is flushed and closed
    /// exactly once.
    ///
    /// # Errors
    /// `SinkFatal` when the sink reports it cannot accept entries anymore.
    #[instrument(name = "dispatcher_run", skip_all, fields(sink = %self.sink_name))]
    pub async fn run(mut self, cancel: CancellationToken) -> Result<MetricsSnapshot, DispatcherError> {
        info!("Dispatcher started");

        let outcome = loop {
            let entry = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Dispatcher caught stop signal");
                    break Ok(());
                }
                received = self.input_rx.recv() => match received {
                    Ok(entry) => entry,
                    Err(_) => {
                        info!("Hand-off queue closed, dispatcher exiting");
                        break Ok(());
                    }
                }
            };

            self.metrics.set_queue_len(self.input_rx.len());
            if let Err(e) = self.deliver(&entry).await {
                break Err(e);
            }
        };

        let discarded = self.input_rx.len() as u64;
        if discarded > 0 {
            info!(discarded, "Discarding queued entries on shutdown");
            self.metrics.add_discarded(discarded);
        }

        self.release().await;

        let snapshot = self.metrics.snapshot();
        info!(
            delivered = snapshot.write_count,
            failed = snapshot.failure_count,
            dropped = snapshot.dropped_count,
            "Dispatcher stopped"
        );
        outcome.map(|_| snapshot)
    }

    /// Deliver one entry, dropping it on error or timeout
    async fn deliver(&mut self, entry: &LogEntry) -> Result<(), DispatcherError> {
        let timeout = self.config.delivery_timeout;

        match tokio::time::timeout(timeout, self.sink.write(entry)).await {
            Ok(Ok(())) => {
                self.metrics.inc_write_count();
                self.recorder
                    .record_dispatch(&self.sink_name, DeliveryStatus::Success);
                Ok(())
            }
            Ok(Err(e)) if e.is_fatal() => {
                self.metrics.inc_failure_count();
                self.recorder
                    .record_dispatch(&self.sink_name, DeliveryStatus::Failure);
                error!(source = entry.source(), error = %e, "Sink is unusable");
                Err(DispatcherError::sink_fatal(&self.sink_name, e))
            }
            Ok(Err(e)) => {
                self.metrics.inc_failure_count();
                self.metrics.inc_dropped_count();
                self.recorder
                    .record_dispatch(&self.sink_name, DeliveryStatus::Failure);
                warn!(source = entry.source(), error = %e, "Write failed, entry dropped");
                Ok(())
            }
            Err(_) => {
                self.metrics.inc_dropped_count();
                self.recorder
                    .record_dispatch(&self.sink_name, DeliveryStatus::Timeout);
                warn!(
                    source = entry.source(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Write timed out, entry dropped"
                );
                Ok(())
            }
        }
    }

    async fn release(&mut self) {
        if let Err(e) = self.sink.flush().await {
            error!(error = %e, "Flush failed on shutdown");
        }
        if let Err(e) = self.sink.close().await {
            error!(error = %e, "Close failed on shutdown");
        }
    }
}
