//! Pipeline orchestrator - wires tailer, queue, dispatcher and health server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use contracts::{AgentConfig, LogEntry};
use dispatcher::{create_sink, ActiveSink, DispatchMetrics, Dispatcher, DispatcherConfig};
use observability::{AgentMetrics, HealthServer, MetricsHandle};
use tailer::{Tailer, TailerConfig};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use super::supervisor::{Supervisor, WorkerOutput};
use super::{PipelineState, PipelineStats};
use crate::error::{PipelineError, Result, WorkerKind};

/// Requests a stop of a running pipeline
///
/// Cloneable; calling [`StopHandle::stop`] more than once is harmless.
#[derive(Clone)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            info!("Pipeline stop requested");
        }
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// A fully constructed pipeline in the `Created` state
pub struct Pipeline {
    config: AgentConfig,
    tailer: Tailer,
    dispatcher: Dispatcher<ActiveSink>,
    dispatch_metrics: Arc<DispatchMetrics>,
    health: HealthServer,
    stop: CancellationToken,
    state: watch::Sender<PipelineState>,
    ready: watch::Sender<bool>,
}

impl Pipeline {
    /// Construct every component without starting any worker
    ///
    /// # Errors
    /// - `Tailer` when collection settings are unusable
    /// - `HealthBind` when the HTTP address cannot be bound
    /// - `Sink` when the sink cannot be created (unreachable Loki)
    #[instrument(name = "pipeline_build", skip_all, fields(node = %config.agent.node_name))]
    pub async fn build(config: AgentConfig, metrics: MetricsHandle) -> Result<Self> {
        let recorder = AgentMetrics::new(config.agent.node_name.as_str());
        let (tx, rx) = async_channel::bounded::<LogEntry>(config.collection.queue_capacity);

        let tailer = Tailer::new(
            TailerConfig::from(&config.collection),
            config.agent.node_name.as_str(),
            tx,
            recorder.clone(),
        )?;

        let (ready, readiness) = watch::channel(false);
        let health = HealthServer::bind(&config.http_server, metrics, readiness)
            .await
            .map_err(|source| PipelineError::HealthBind {
                address: config.http_server.address.clone(),
                source,
            })?;

        // Last fallible step: nothing needs releasing when it fails
        let sink = create_sink(&config.sink, &config.agent).await?;

        let dispatcher = Dispatcher::new(
            sink,
            rx,
            DispatcherConfig::from(&config.dispatch),
            recorder,
        );
        let dispatch_metrics = dispatcher.metrics();

        let (state, _) = watch::channel(PipelineState::Created);

        info!(
            sink = dispatcher.sink_name(),
            queue_capacity = config.collection.queue_capacity,
            health_address = %health.local_addr(),
            "Pipeline created"
        );

        Ok(Self {
            config,
            tailer,
            dispatcher,
            dispatch_metrics,
            health,
            stop: CancellationToken::new(),
            state,
            ready,
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            token: self.stop.clone(),
        }
    }

    /// Subscribe to lifecycle transitions
    pub fn state(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    pub fn health_addr(&self) -> SocketAddr {
        self.health.local_addr()
    }

    /// Run all workers until `shutdown` resolves, a stop is requested, or a
    /// worker fails
    ///
    /// # Errors
    /// - `WorkerFailed` for the first worker that failed, panicked or
    ///   returned on its own
    /// - `ShutdownTimeout` when workers outlive `agent.shutdown_grace_ms`
    #[instrument(name = "pipeline_run", skip_all, fields(node = %self.config.agent.node_name))]
    pub async fn run_until<F>(self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        let Self {
            config,
            tailer,
            dispatcher,
            dispatch_metrics,
            health,
            stop,
            state,
            ready,
        } = self;

        let started = Instant::now();
        let cancel = CancellationToken::new();
        let mut supervisor = Supervisor::new(cancel.clone());

        let token = cancel.clone();
        supervisor.spawn(WorkerKind::HealthServer, async move {
            health
                .serve(token)
                .await
                .map(|()| WorkerOutput::HealthServer)
                .map_err(|e| e.to_string())
        });

        let token = cancel.clone();
        supervisor.spawn(WorkerKind::Dispatcher, async move {
            dispatcher
                .run(token)
                .await
                .map(WorkerOutput::Dispatcher)
                .map_err(|e| e.to_string())
        });

        let token = cancel.clone();
        supervisor.spawn(WorkerKind::Tailer, async move {
            tailer
                .run(token)
                .await
                .map(WorkerOutput::Tailer)
                .map_err(|e| e.to_string())
        });

        state.send_replace(PipelineState::Running);
        ready.send_replace(true);
        info!("Pipeline running");

        supervisor.wait(shutdown, &stop).await;

        state.send_replace(PipelineState::Stopping);
        ready.send_replace(false);
        info!("Pipeline stopping");

        let (outputs, failure) = supervisor.shutdown(config.agent.shutdown_grace()).await;

        state.send_replace(PipelineState::Stopped);
        let stats = PipelineStats::collect(
            outputs.tailer.as_ref(),
            dispatch_metrics.snapshot(),
            started.elapsed(),
        );
        info!(
            lines_read = stats.lines_read,
            delivered = stats.delivered,
            discarded = stats.discarded,
            "Pipeline stopped"
        );

        match failure {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }
}
