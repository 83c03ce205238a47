//! Loki client errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LokiError {
    /// Push URL missing, unparsable or not http(s)
    #[error("invalid Loki url '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// Readiness probe failed
    #[error("Loki at {url} is not ready: {message}")]
    NotReady { url: String, message: String },

    /// Client was stopped, nothing is accepted anymore
    #[error("Loki client is stopped")]
    Closed,

    /// Push worker ended abnormally
    #[error("Loki push worker failed: {0}")]
    Worker(String),
}

impl LokiError {
    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }
}
