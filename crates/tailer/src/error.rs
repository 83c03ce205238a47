//! Tailer error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that end the tailer worker
#[derive(Debug, Error)]
pub enum TailerError {
    /// Construction rejected
    #[error("invalid tailer configuration: {message}")]
    InvalidConfig { message: String },

    /// The hand-off queue has no consumer anymore
    #[error("hand-off queue closed")]
    QueueClosed,
}

impl TailerError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Transient per-file failure, logged and retried on the next tick
#[derive(Debug, Error)]
pub enum FileError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to stat {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {path} at offset {offset}: {source}")]
    Read {
        path: PathBuf,
        offset: u64,
        #[source]
        source: io::Error,
    },
}

impl FileError {
    /// Metric label
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::Stat { .. } => "stat",
            Self::Read { .. } => "read",
        }
    }
}

/// Tailer Result type alias
pub type Result<T> = std::result::Result<T, TailerError>;
