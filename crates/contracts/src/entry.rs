//! LogEntry - Tailer output, Dispatcher input
//!
//! The structured unit flowing through the pipeline.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Suffix rendered by sinks after a truncated message
pub const TRUNCATION_MARKER: &str = " [truncated]";

/// Severity label attached to every entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    /// Lower-case label used in rendered lines and remote labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One collected log line
///
/// Immutable once built; `node_name` and `source` are shared between all
/// entries of the same file so cloning an entry is cheap. Deserialization
/// goes through the same checks as [`LogEntry::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEntry")]
pub struct LogEntry {
    timestamp: DateTime<Utc>,
    node_name: Arc<str>,
    source: Arc<str>,
    message: String,
    level: LogLevel,
    truncated: bool,
}

impl LogEntry {
    /// Build an entry captured now
    ///
    /// # Errors
    /// Returns `InvalidEntry` when `node_name` or `source` is empty, or when the
    /// message carries a line terminator (`\n` or `\r`).
    pub fn new(
        node_name: Arc<str>,
        source: Arc<str>,
        message: String,
        level: LogLevel,
        truncated: bool,
    ) -> Result<Self, ContractError> {
        Self::with_timestamp(Utc::now(), node_name, source, message, level, truncated)
    }

    /// Build an entry with an explicit capture time
    pub fn with_timestamp(
        timestamp: DateTime<Utc>,
        node_name: Arc<str>,
        source: Arc<str>,
        message: String,
        level: LogLevel,
        truncated: bool,
    ) -> Result<Self, ContractError> {
        if node_name.is_empty() {
            return Err(ContractError::invalid_entry("node_name is empty"));
        }
        if source.is_empty() {
            return Err(ContractError::invalid_entry("source is empty"));
        }
        if message.contains(['\n', '\r']) {
            return Err(ContractError::invalid_entry(
                "message contains a line terminator",
            ));
        }

        Ok(Self {
            timestamp,
            node_name,
            source,
            message,
            level,
            truncated,
        })
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Whether the original line was longer than the configured maximum
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Message as sinks render it, with the truncation marker when needed
    pub fn display_message(&self) -> Cow<'_, str> {
        if self.truncated {
            Cow::Owned(format!("{}{}", self.message, TRUNCATION_MARKER))
        } else {
            Cow::Borrowed(&self.message)
        }
    }
}

/// Wire shape of an entry before validation
#[derive(Deserialize)]
struct RawEntry {
    timestamp: DateTime<Utc>,
    node_name: Arc<str>,
    source: Arc<str>,
    message: String,
    #[serde(default)]
    level: LogLevel,
    #[serde(default)]
    truncated: bool,
}

impl TryFrom<RawEntry> for LogEntry {
    type Error = ContractError;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        Self::with_timestamp(
            raw.timestamp,
            raw.node_name,
            raw.source,
            raw.message,
            raw.level,
            raw.truncated,
        )
    }
}

/// Cut `message` to at most `max_len` bytes on a char boundary
///
/// Returns true when something was removed.
pub fn truncate_message(message: &mut String, max_len: usize) -> bool {
    if message.len() <= max_len {
        return false;
    }
    let mut cut = max_len;
    while !message.is_char_boundary(cut) {
        cut -= 1;
    }
    message.truncate(cut);
    true
}
