//! Worker supervision: first failure wins, bounded join on shutdown.

use std::any::Any;
use std::future::Future;
use std::time::Duration;

use dispatcher::MetricsSnapshot;
use tailer::TailerStats;
use tokio::task::{AbortHandle, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{PipelineError, WorkerKind};

/// What a worker hands back when it stops cleanly
#[derive(Debug)]
pub enum WorkerOutput {
    Tailer(TailerStats),
    Dispatcher(MetricsSnapshot),
    HealthServer,
}

/// Worker result, the error already rendered for logging
pub type WorkerResult = std::result::Result<WorkerOutput, String>;

type Exit = (WorkerKind, std::result::Result<WorkerResult, JoinError>);

/// Outputs collected from workers that stopped cleanly
#[derive(Debug, Default)]
pub struct Outputs {
    pub tailer: Option<TailerStats>,
    pub dispatcher: Option<MetricsSnapshot>,
}

impl Outputs {
    fn absorb(&mut self, output: WorkerOutput) {
        match output {
            WorkerOutput::Tailer(stats) => self.tailer = Some(stats),
            WorkerOutput::Dispatcher(snapshot) => self.dispatcher = Some(snapshot),
            WorkerOutput::HealthServer => {}
        }
    }
}

/// Owns the worker tasks of one pipeline run
///
/// Every worker runs in its own task; a thin watcher task in the
/// [`JoinSet`] pairs the result with the worker kind so panics and aborts
/// can still be attributed.
pub struct Supervisor {
    tasks: JoinSet<Exit>,
    aborts: Vec<AbortHandle>,
    cancel: CancellationToken,
    outputs: Outputs,
    failure: Option<PipelineError>,
}

impl Supervisor {
    /// `cancel` is the token every spawned worker observes
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            tasks: JoinSet::new(),
            aborts: Vec::new(),
            cancel,
            outputs: Outputs::default(),
            failure: None,
        }
    }

    pub fn spawn<F>(&mut self, kind: WorkerKind, worker: F)
    where
        F: Future<Output = WorkerResult> + Send + 'static,
    {
        let handle = tokio::spawn(worker);
        self.aborts.push(handle.abort_handle());
        self.tasks.spawn(async move { (kind, handle.await) });
        debug!(worker = %kind, "Worker spawned");
    }

    /// Wait for `shutdown`, a stop request, or the first worker to end
    ///
    /// A worker ending here is always a failure: nothing has been
    /// cancelled yet.
    pub async fn wait<F>(&mut self, shutdown: F, stop: &CancellationToken)
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => info!("Shutdown signal received"),
            _ = stop.cancelled() => info!("Stop requested"),
            Some(Ok(exit)) = self.tasks.join_next() => self.record(exit, false),
        }
    }

    /// Cancel all workers and join them within `grace`
    ///
    /// Returns the collected outputs and the first failure, if any.
    pub async fn shutdown(mut self, grace: Duration) -> (Outputs, Option<PipelineError>) {
        self.cancel.cancel();

        let joined = tokio::time::timeout(grace, async {
            while let Some(exit) = self.tasks.join_next().await {
                if let Ok(exit) = exit {
                    self.record(exit, true);
                }
            }
        })
        .await;

        if joined.is_err() {
            warn!(
                grace_ms = grace.as_millis() as u64,
                remaining = self.tasks.len(),
                "Workers did not stop in time, aborting"
            );
            for handle in &self.aborts {
                handle.abort();
            }
            while self.tasks.join_next().await.is_some() {}
            self.failure
                .get_or_insert(PipelineError::ShutdownTimeout { grace });
        }

        (self.outputs, self.failure)
    }

    fn record(&mut self, (kind, joined): Exit, stopping: bool) {
        let reason = match joined {
            Ok(Ok(output)) => {
                self.outputs.absorb(output);
                if stopping {
                    debug!(worker = %kind, "Worker stopped");
                    None
                } else {
                    Some("exited before shutdown was requested".to_string())
                }
            }
            Ok(Err(reason)) => Some(reason),
            Err(e) if e.is_panic() => Some(format!("panicked: {}", panic_message(e.into_panic()))),
            Err(e) => Some(e.to_string()),
        };

        if let Some(reason) = reason {
            error!(worker = %kind, reason = %reason, "Worker failed");
            self.failure
                .get_or_insert_with(|| PipelineError::worker_failed(kind, reason));
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
