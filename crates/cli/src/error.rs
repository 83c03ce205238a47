//! Error types for the pipeline lifecycle.

use std::fmt;
use std::io;
use std::time::Duration;

use dispatcher::DispatcherError;
use tailer::TailerError;
use thiserror::Error;

/// Long-running workers owned by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerKind {
    Tailer,
    Dispatcher,
    HealthServer,
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tailer => "tailer",
            Self::Dispatcher => "dispatcher",
            Self::HealthServer => "health_server",
        })
    }
}

/// Pipeline construction and supervision errors
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Sink could not be created; there is no fallback sink
    #[error(transparent)]
    Sink(#[from] DispatcherError),

    /// Tailer rejected its configuration
    #[error("Tailer setup failed: {0}")]
    Tailer(#[from] TailerError),

    /// Health server address could not be bound
    #[error("Failed to bind health server on {address}: {source}")]
    HealthBind {
        address: String,
        #[source]
        source: io::Error,
    },

    /// A worker ended with an error, panicked or returned before shutdown
    #[error("{worker} worker failed: {reason}")]
    WorkerFailed { worker: WorkerKind, reason: String },

    /// Workers were still running when the grace period ran out
    #[error("Workers did not stop within {grace:?}")]
    ShutdownTimeout { grace: Duration },
}

impl PipelineError {
    pub fn worker_failed(worker: WorkerKind, reason: impl Into<String>) -> Self {
        Self::WorkerFailed {
            worker,
            reason: reason.into(),
        }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
