//! Pipeline lifecycle states.

use std::fmt;

/// `Created → Running → Stopping → Stopped`, no restart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Queue, sink, tailer and dispatcher built, nothing spawned
    Created,
    /// Workers spawned
    Running,
    /// Cancellation broadcast, joining workers
    Stopping,
    /// All workers joined or aborted
    Stopped,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        self == Self::Stopped
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        })
    }
}
