//! # Observability
//!
//! 可观测性模块：Tracing + Prometheus 指标 + 健康检查 HTTP 服务。
//!
//! ## 功能
//!
//! - Tracing 初始化 (JSON/Pretty/Compact 格式，输出到 stderr)
//! - Prometheus recorder，每个进程只安装一次
//! - [`AgentMetrics`] 指标记录句柄
//! - [`HealthServer`] 提供 `/healthz`、`/status` 和 `/metrics`
//!
//! ## 使用示例
//!
//! ```ignore
//! let handle = observability::init_metrics()?;
//! let metrics = observability::AgentMetrics::new("node-1");
//! metrics.record_lines_collected("/var/log/*.log", 10);
//! ```

pub mod metrics;
pub mod server;

use std::sync::Mutex;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// Re-exports
pub use crate::metrics::{AgentMetrics, DeliveryStatus};
pub use crate::server::{HealthServer, Readiness};
pub use metrics_exporter_prometheus::PrometheusHandle as MetricsHandle;

static PROMETHEUS: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Tracing configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log format
    pub log_format: LogFormat,
    /// Filter used when `RUST_LOG` is unset
    pub default_log_level: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            default_log_level: "info".to_string(),
        }
    }
}

/// Log format
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs
    #[default]
    Json,
    /// Human-readable
    Pretty,
    /// Compact single line
    Compact,
}

/// Initialize the global tracing subscriber
///
/// Diagnostics go to stderr; stdout belongs to the stdout sink.
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer(config.log_format, std::io::stderr))
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::debug!(log_format = ?config.log_format, "Tracing initialized");
    Ok(())
}

fn fmt_layer<S, W>(format: LogFormat, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_writer(writer).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_writer(writer).boxed(),
    }
}

/// Install the Prometheus recorder
///
/// Must run before any worker starts. Repeated calls return the handle of
/// the recorder installed first.
pub fn init_metrics() -> Result<PrometheusHandle> {
    let mut installed = PROMETHEUS
        .lock()
        .map_err(|_| anyhow::anyhow!("Prometheus recorder lock poisoned"))?;
    if let Some(handle) = installed.as_ref() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    *installed = Some(handle.clone());

    tracing::info!("Prometheus recorder installed");
    Ok(handle)
}
