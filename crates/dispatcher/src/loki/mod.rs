//! Loki remote-delivery client
//!
//! Accepts labeled lines through a channel and ships them asynchronously;
//! `stop()` flushes and releases the worker.

mod client;
mod error;
mod push;

pub use client::{LokiClient, LokiStats};
pub use error::LokiError;
pub use push::{LabelSet, LokiEntry, PushRequest, PushStream};
