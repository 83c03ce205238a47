//! Sink implementations
//!
//! Contains StdoutSink and LokiSink, plus the [`ActiveSink`] selected once
//! from configuration.

mod loki;
mod stdout;

use contracts::{ContractError, DataSink, LogEntry, NodeIdentity, SinkConfig};
use tracing::{info, instrument};

pub use self::loki::LokiSink;
pub use self::stdout::StdoutSink;

use crate::error::DispatcherError;

/// The sink chosen at startup
pub enum ActiveSink {
    Stdout(StdoutSink),
    Loki(LokiSink),
}

impl DataSink for ActiveSink {
    fn name(&self) -> &str {
        match self {
            Self::Stdout(sink) => sink.name(),
            Self::Loki(sink) => sink.name(),
        }
    }

    async fn write(&mut self, entry: &LogEntry) -> Result<(), ContractError> {
        match self {
            Self::Stdout(sink) => sink.write(entry).await,
            Self::Loki(sink) => sink.write(entry).await,
        }
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        match self {
            Self::Stdout(sink) => sink.flush().await,
            Self::Loki(sink) => sink.flush().await,
        }
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        match self {
            Self::Stdout(sink) => sink.close().await,
            Self::Loki(sink) => sink.close().await,
        }
    }
}

/// Build the sink described by `config`
///
/// # Errors
/// `SinkInit` when the remote endpoint is misconfigured or unreachable.
/// There is no fallback to stdout.
#[instrument(name = "dispatcher_create_sink", skip_all, fields(sink_type = config.kind()))]
pub async fn create_sink(
    config: &SinkConfig,
    identity: &NodeIdentity,
) -> Result<ActiveSink, DispatcherError> {
    let sink = match config {
        SinkConfig::Stdout => ActiveSink::Stdout(StdoutSink::new()),
        SinkConfig::Loki(loki) => {
            let sink = LokiSink::connect(loki.clone(), &identity.app_name)
                .await
                .map_err(|e| DispatcherError::sink_init(config.kind(), e.to_string()))?;
            ActiveSink::Loki(sink)
        }
    };

    info!(sink = sink.name(), "Sink initialized");
    Ok(sink)
}
