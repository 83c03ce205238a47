//! Pipeline lifecycle module.

mod orchestrator;
mod state;
mod stats;
mod supervisor;

pub use orchestrator::{Pipeline, StopHandle};
pub use state::PipelineState;
pub use stats::PipelineStats;
