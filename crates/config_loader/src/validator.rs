//! 配置校验模块
//!
//! 校验规则：
//! - 至少一个日志路径，且没有空 pattern（非法 glob 只告警，见 [`malformed_patterns`]）
//! - interval / batch_size / max_line_length / queue_capacity > 0
//! - 节点身份 (node_name) 必填
//! - Loki URL 为 http(s)，min_backoff <= max_backoff
//! - 健康检查地址是合法的 socket 地址

use std::net::SocketAddr;

use contracts::{AgentConfig, ContractError, LokiConfig, SinkConfig};

/// Validate an AgentConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &AgentConfig) -> Result<(), ContractError> {
    validate_identity(config)?;
    validate_log_paths(config)?;
    validate_collection_limits(config)?;
    validate_dispatch(config)?;
    validate_sink(config)?;
    validate_http_server(config)?;
    Ok(())
}

fn validate_identity(config: &AgentConfig) -> Result<(), ContractError> {
    if config.agent.node_name.trim().is_empty() {
        return Err(ContractError::config_validation(
            "agent.node_name",
            "node_name cannot be empty (set it in the config or via NODE_NAME)",
        ));
    }
    Ok(())
}

fn validate_log_paths(config: &AgentConfig) -> Result<(), ContractError> {
    let paths = &config.collection.log_paths;
    if paths.is_empty() {
        return Err(ContractError::config_validation(
            "collection.log_paths",
            "at least one log path pattern is required",
        ));
    }

    for (idx, pattern) in paths.iter().enumerate() {
        if pattern.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("collection.log_paths[{idx}]"),
                "pattern cannot be empty",
            ));
        }
    }
    Ok(())
}

/// Patterns that will never match because they do not parse as globs
///
/// Not a validation error: the tailer logs and skips such a pattern on every
/// tick while the others keep working.
pub fn malformed_patterns(config: &AgentConfig) -> Vec<(usize, String)> {
    config
        .collection
        .log_paths
        .iter()
        .enumerate()
        .filter_map(|(idx, pattern)| {
            glob::Pattern::new(pattern)
                .err()
                .map(|e| (idx, format!("'{pattern}': {e}")))
        })
        .collect()
}

fn validate_collection_limits(config: &AgentConfig) -> Result<(), ContractError> {
    let c = &config.collection;
    let checks = [
        ("collection.interval_ms", c.interval_ms),
        ("collection.batch_size", c.batch_size as u64),
        ("collection.max_line_length", c.max_line_length as u64),
        ("collection.queue_capacity", c.queue_capacity as u64),
    ];

    for (field, value) in checks {
        if value == 0 {
            return Err(ContractError::config_validation(
                field,
                format!("{} must be > 0, got 0", field_name(field)),
            ));
        }
    }
    Ok(())
}

fn validate_dispatch(config: &AgentConfig) -> Result<(), ContractError> {
    if config.dispatch.delivery_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "dispatch.delivery_timeout_ms",
            "delivery_timeout_ms must be > 0, got 0",
        ));
    }
    Ok(())
}

fn validate_sink(config: &AgentConfig) -> Result<(), ContractError> {
    match &config.sink {
        SinkConfig::Stdout => Ok(()),
        SinkConfig::Loki(loki) => validate_loki(loki),
    }
}

fn validate_loki(loki: &LokiConfig) -> Result<(), ContractError> {
    let url = loki.url.trim();
    let scheme_ok = url.starts_with("http://") || url.starts_with("https://");
    let has_host = url
        .split_once("://")
        .map(|(_, rest)| !rest.is_empty() && !rest.starts_with('/'))
        .unwrap_or(false);
    if !scheme_ok || !has_host {
        return Err(ContractError::config_validation(
            "sink.url",
            format!("expected an http(s) push URL, got '{}'", loki.url),
        ));
    }

    if loki.batch_size == 0 {
        return Err(ContractError::config_validation(
            "sink.batch_size",
            "batch_size must be > 0, got 0",
        ));
    }

    if loki.queue_capacity == 0 {
        return Err(ContractError::config_validation(
            "sink.queue_capacity",
            "queue_capacity must be > 0, got 0",
        ));
    }

    if loki.min_backoff_ms > loki.max_backoff_ms {
        return Err(ContractError::config_validation(
            "sink.min_backoff_ms / sink.max_backoff_ms",
            format!(
                "min_backoff_ms ({}) must be <= max_backoff_ms ({})",
                loki.min_backoff_ms, loki.max_backoff_ms
            ),
        ));
    }
    Ok(())
}

fn validate_http_server(config: &AgentConfig) -> Result<(), ContractError> {
    if config.http_server.address.parse::<SocketAddr>().is_err() {
        return Err(ContractError::config_validation(
            "http_server.address",
            format!(
                "'{}' is not a valid socket address",
                config.http_server.address
            ),
        ));
    }
    Ok(())
}

fn field_name(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}
