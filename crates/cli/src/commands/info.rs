//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{AgentConfig, LokiConfig, SinkConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output, credentials redacted
#[derive(Serialize)]
struct ConfigInfo {
    identity: IdentityInfo,
    collection: CollectionInfo,
    delivery_timeout_ms: u64,
    sink: SinkInfo,
    http_address: String,
}

#[derive(Serialize)]
struct IdentityInfo {
    node_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pod_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    app_name: String,
    shutdown_grace_ms: u64,
}

#[derive(Serialize)]
struct CollectionInfo {
    log_paths: Vec<String>,
    interval_ms: u64,
    batch_size: usize,
    max_line_length: usize,
    queue_capacity: usize,
    start_at: String,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SinkInfo {
    Stdout,
    Loki {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tenant_id: Option<String>,
        auth: &'static str,
        batch_size: usize,
        batch_wait_ms: u64,
        max_retries: u32,
        #[serde(skip_serializing_if = "std::collections::BTreeMap::is_empty")]
        external_labels: std::collections::BTreeMap<String, String>,
    },
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&config);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config);
    }

    Ok(())
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn auth_method(loki: &LokiConfig) -> &'static str {
    if loki.bearer_token.is_some() {
        "bearer"
    } else if loki.username.is_some() {
        "basic"
    } else {
        "none"
    }
}

fn build_config_info(config: &AgentConfig) -> ConfigInfo {
    let sink = match &config.sink {
        SinkConfig::Stdout => SinkInfo::Stdout,
        SinkConfig::Loki(loki) => SinkInfo::Loki {
            url: loki.url.clone(),
            tenant_id: loki.tenant_id.clone(),
            auth: auth_method(loki),
            batch_size: loki.batch_size,
            batch_wait_ms: loki.batch_wait_ms,
            max_retries: loki.max_retries,
            external_labels: loki.external_labels.clone(),
        },
    };

    ConfigInfo {
        identity: IdentityInfo {
            node_name: config.agent.node_name.clone(),
            pod_name: non_empty(&config.agent.pod_name),
            namespace: non_empty(&config.agent.namespace),
            app_name: config.agent.app_name.clone(),
            shutdown_grace_ms: config.agent.shutdown_grace_ms,
        },
        collection: CollectionInfo {
            log_paths: config.collection.log_paths.clone(),
            interval_ms: config.collection.interval_ms,
            batch_size: config.collection.batch_size,
            max_line_length: config.collection.max_line_length,
            queue_capacity: config.collection.queue_capacity,
            start_at: format!("{:?}", config.collection.start_at).to_lowercase(),
        },
        delivery_timeout_ms: config.dispatch.delivery_timeout_ms,
        sink,
        http_address: config.http_server.address.clone(),
    }
}

fn print_config_info(config: &AgentConfig) {
    println!("═══════════════════════════════════════════════════════════");
    println!("                   logship Configuration                   ");
    println!("═══════════════════════════════════════════════════════════");

    println!("\n▶ Identity");
    println!("  Node: {}", config.agent.node_name);
    if let Some(pod) = non_empty(&config.agent.pod_name) {
        println!("  Pod: {}", pod);
    }
    if let Some(namespace) = non_empty(&config.agent.namespace) {
        println!("  Namespace: {}", namespace);
    }
    println!("  App: {}", config.agent.app_name);

    println!("\n▶ Collection");
    for pattern in &config.collection.log_paths {
        println!("  - {}", pattern);
    }
    println!(
        "  Every {}ms, up to {} lines per file, {} byte lines",
        config.collection.interval_ms, config.collection.batch_size, config.collection.max_line_length
    );
    println!("  Queue capacity: {}", config.collection.queue_capacity);

    println!("\n▶ Sink: {}", config.sink.kind());
    if let SinkConfig::Loki(loki) = &config.sink {
        println!("  URL: {}", loki.url);
        if let Some(tenant) = &loki.tenant_id {
            println!("  Tenant: {}", tenant);
        }
        println!("  Auth: {}", auth_method(loki));
        for (key, value) in &loki.external_labels {
            println!("  Label {}={}", key, value);
        }
    }
    println!("  Delivery timeout: {}ms", config.dispatch.delivery_timeout_ms);

    println!("\n▶ HTTP server: {}", config.http_server.address);
    println!();
}
