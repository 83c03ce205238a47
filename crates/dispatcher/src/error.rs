//! Dispatcher error types

use contracts::ContractError;
use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink construction failed, the pipeline must not start
    #[error("failed to initialize sink '{sink}': {message}")]
    SinkInit { sink: String, message: String },

    /// The active sink can no longer accept entries
    #[error("sink '{sink}' failed fatally: {source}")]
    SinkFatal {
        sink: String,
        #[source]
        source: ContractError,
    },
}

/// Name used where a single sink-construction error type is expected
pub type SinkInitError = DispatcherError;

impl DispatcherError {
    /// Create a sink initialization error
    pub fn sink_init(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkInit {
            sink: sink.into(),
            message: message.into(),
        }
    }

    pub fn sink_fatal(sink: impl Into<String>, source: ContractError) -> Self {
        Self::SinkFatal {
            sink: sink.into(),
            source,
        }
    }
}
