//! AgentConfig - Config Loader 输出
//!
//! 描述完整的代理配置：节点身份、采集参数、sink 路由、健康检查服务。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Complete agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Node identity and lifecycle settings
    pub agent: NodeIdentity,

    /// File discovery and reading
    pub collection: CollectionConfig,

    /// Dispatcher behavior
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Output routing
    #[serde(default)]
    pub sink: SinkConfig,

    /// Health/readiness/metrics HTTP server
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

/// Identity of the host/pod producing entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Node name, overridable by `NODE_NAME`
    #[serde(default)]
    pub node_name: String,

    /// Pod name, overridable by `POD_NAME`
    #[serde(default)]
    pub pod_name: String,

    /// Namespace, overridable by `POD_NAMESPACE`
    #[serde(default)]
    pub namespace: String,

    /// Application label attached to remote streams
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Upper bound for joining workers on shutdown
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_app_name() -> String {
    "logging-agent".to_string()
}

fn default_shutdown_grace_ms() -> u64 {
    10_000
}

impl NodeIdentity {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Where to begin reading a file seen for the first time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPosition {
    /// Read the whole file from offset 0
    #[default]
    Beginning,
    /// Skip existing content, only follow appended lines
    End,
}

/// File discovery and reading settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Glob patterns expanded on every tick
    pub log_paths: Vec<String>,

    /// Scan interval in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Max lines emitted per file per tick
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Max message length in bytes, longer lines are truncated
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,

    /// Hand-off queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// First read position for newly discovered files
    #[serde(default)]
    pub start_at: StartPosition,

    /// Warn every N milliseconds while the tailer waits on a full queue
    #[serde(default = "default_enqueue_warn_ms")]
    pub enqueue_warn_ms: u64,
}

fn default_interval_ms() -> u64 {
    1_000
}

fn default_batch_size() -> usize {
    100
}

fn default_max_line_length() -> usize {
    16 * 1024
}

fn default_queue_capacity() -> usize {
    1_000
}

fn default_enqueue_warn_ms() -> u64 {
    5_000
}

impl CollectionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn enqueue_warn_after(&self) -> Duration {
        Duration::from_millis(self.enqueue_warn_ms)
    }
}

/// Dispatcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Max time a single sink write may take before the entry is dropped
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
}

fn default_delivery_timeout_ms() -> u64 {
    5_000
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            delivery_timeout_ms: default_delivery_timeout_ms(),
        }
    }
}

impl DispatchConfig {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

/// Sink selection, fixed for the lifetime of the process
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Render entries to standard output
    #[default]
    Stdout,
    /// Push entries to a Loki endpoint
    Loki(LokiConfig),
}

impl SinkConfig {
    /// Short name used in logs and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Loki(_) => "loki",
        }
    }
}

/// Loki push client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LokiConfig {
    /// Full push URL, e.g. `http://loki:3100/loki/api/v1/push`
    pub url: String,

    /// Sent as `X-Scope-OrgID`
    #[serde(default)]
    pub tenant_id: Option<String>,

    /// Basic auth user
    #[serde(default)]
    pub username: Option<String>,

    /// Basic auth password
    #[serde(default)]
    pub password: Option<String>,

    /// Bearer token, takes precedence over basic auth
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Entries per push request
    #[serde(default = "default_loki_batch_size")]
    pub batch_size: usize,

    /// Max time an entry waits in a partial batch
    #[serde(default = "default_batch_wait_ms")]
    pub batch_wait_ms: u64,

    /// HTTP request timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries per batch on retryable failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_min_backoff_ms")]
    pub min_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Probe `<base>/ready` during construction
    #[serde(default = "default_probe_ready")]
    pub probe_ready: bool,

    /// Capacity of the client's ingestion channel
    #[serde(default = "default_client_queue_capacity")]
    pub queue_capacity: usize,

    /// Static labels added to every stream
    #[serde(default)]
    pub external_labels: BTreeMap<String, String>,
}

fn default_loki_batch_size() -> usize {
    500
}

fn default_batch_wait_ms() -> u64 {
    1_000
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    5
}

fn default_min_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

fn default_probe_ready() -> bool {
    true
}

fn default_client_queue_capacity() -> usize {
    1_024
}

impl LokiConfig {
    /// Config with defaults for everything but the URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tenant_id: None,
            username: None,
            password: None,
            bearer_token: None,
            batch_size: default_loki_batch_size(),
            batch_wait_ms: default_batch_wait_ms(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            min_backoff_ms: default_min_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            probe_ready: default_probe_ready(),
            queue_capacity: default_client_queue_capacity(),
            external_labels: BTreeMap::new(),
        }
    }

    pub fn batch_wait(&self) -> Duration {
        Duration::from_millis(self.batch_wait_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn min_backoff(&self) -> Duration {
        Duration::from_millis(self.min_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

/// Health server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpServerConfig {
    /// Listen address
    #[serde(default = "default_http_address")]
    pub address: String,

    /// Per-request timeout
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_http_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            address: default_http_address(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl HttpServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl AgentConfig {
    /// Minimal configuration used by tests and examples
    pub fn for_paths(node_name: impl Into<String>, log_paths: Vec<String>) -> Self {
        Self {
            agent: NodeIdentity {
                node_name: node_name.into(),
                pod_name: String::new(),
                namespace: String::new(),
                app_name: default_app_name(),
                shutdown_grace_ms: default_shutdown_grace_ms(),
            },
            collection: CollectionConfig {
                log_paths,
                interval_ms: default_interval_ms(),
                batch_size: default_batch_size(),
                max_line_length: default_max_line_length(),
                queue_capacity: default_queue_capacity(),
                start_at: StartPosition::default(),
                enqueue_warn_ms: default_enqueue_warn_ms(),
            },
            dispatch: DispatchConfig::default(),
            sink: SinkConfig::default(),
            http_server: HttpServerConfig::default(),
        }
    }
}
