//! Layered error definitions
//!
//! Categorized by source: config / entry / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Entry Errors =====
    /// Entry construction rejected
    #[error("invalid log entry: {message}")]
    InvalidEntry { message: String },

    // ===== Sink Errors =====
    /// Sink write error, the entry is lost but the sink stays usable
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink is no longer usable
    #[error("sink '{sink_name}' is broken: {message}")]
    SinkBroken { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create invalid entry error
    pub fn invalid_entry(message: impl Into<String>) -> Self {
        Self::InvalidEntry {
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create broken sink error
    pub fn sink_broken(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkBroken {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Whether the error leaves its producer unusable
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SinkBroken { .. })
    }
}
