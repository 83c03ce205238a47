//! # Tailer
//!
//! Log file discovery and collection.
//!
//! Responsibilities:
//! - Expand glob patterns into concrete files on every tick
//! - Track a read cursor per file, reset on rotation or truncation
//! - Read at most `batch_size` complete lines per file per tick
//! - Hand `LogEntry` values to the bounded queue with backpressure
//!
//! ## Usage Example
//!
//! ```ignore
//! use tailer::{Tailer, TailerConfig};
//!
//! let (tx, rx) = async_channel::bounded(1000);
//! let tailer = Tailer::new(TailerConfig::from(&config.collection), "node-1", tx, metrics)?;
//! tokio::spawn(tailer.run(cancel.clone()));
//! while let Ok(entry) = rx.recv().await {
//!     // Deliver entry
//! }
//! ```

mod config;
mod cursor;
mod error;
mod reader;
mod scanner;

// Re-exports
pub use config::{ScanReport, TailerConfig, TailerStats};
pub use cursor::{CursorStore, FileCursor, FileIdentity, Observation, ResetReason};
pub use error::{FileError, Result, TailerError};
pub use reader::{read_batch, Line, ReadBatch};
pub use scanner::Tailer;
