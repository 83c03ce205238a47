//! # Dispatcher
//!
//! 日志分发模块。
//!
//! 负责：
//! - 从交接队列消费 `LogEntry`
//! - 投递到唯一的活动 sink
//! - 每次写入有超时上限，卡住的条目不阻塞主循环
//! - 管理 sink 生命周期（关闭时只 flush / close 一次）

pub mod dispatcher;
pub mod error;
pub mod loki;
pub mod metrics;
pub mod sinks;

pub use contracts::{DataSink, LogEntry};
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use error::{DispatcherError, SinkInitError};
pub use loki::{LokiClient, LokiError};
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use sinks::{create_sink, ActiveSink, LokiSink, StdoutSink};
