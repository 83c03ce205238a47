//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the agent.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Data flow
//! - The tailer produces [`LogEntry`] values from watched files
//! - The dispatcher hands each entry to exactly one [`DataSink`]
//! - [`AgentConfig`] is the single configuration document consumed by all stages

mod config;
mod entry;
mod error;
mod sink;

pub use config::*;
pub use entry::*;
pub use error::*;
pub use sink::*;
