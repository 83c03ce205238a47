//! # logship CLI library
//!
//! Commands and the pipeline lifecycle behind the `logship` binary.

pub mod cli;
pub mod commands;
pub mod error;
pub mod pipeline;

pub use error::{PipelineError, WorkerKind};
pub use pipeline::{Pipeline, PipelineState, PipelineStats, StopHandle};
