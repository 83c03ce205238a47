//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{AgentConfig, SinkConfig, StartPosition};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    node_name: String,
    app_name: String,
    sink: &'static str,
    log_path_count: usize,
    queue_capacity: usize,
    http_address: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    node_name: config.agent.node_name.clone(),
                    app_name: config.agent.app_name.clone(),
                    sink: config.sink.kind(),
                    log_path_count: config.collection.log_paths.len(),
                    queue_capacity: config.collection.queue_capacity,
                    http_address: config.http_server.address.clone(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &AgentConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    for (idx, problem) in config_loader::ConfigLoader::malformed_patterns(config) {
        warnings.push(format!(
            "collection.log_paths[{idx}] is not a valid glob and will be skipped: {problem}"
        ));
    }

    match &config.sink {
        SinkConfig::Stdout => {
            warnings.push("sink is stdout - entries are not shipped off the node".to_string());
        }
        SinkConfig::Loki(loki) if !loki.probe_ready => {
            warnings.push(
                "sink.probe_ready is false - an unreachable Loki is only noticed on push"
                    .to_string(),
            );
        }
        SinkConfig::Loki(_) => {}
    }

    if config.collection.start_at == StartPosition::End {
        warnings.push("collection.start_at = \"end\" - existing file content is skipped".to_string());
    }

    if config.dispatch.delivery_timeout() > config.agent.shutdown_grace() {
        warnings.push(
            "dispatch.delivery_timeout_ms exceeds agent.shutdown_grace_ms - a stuck write can outlive the shutdown grace period"
                .to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Node: {}", summary.node_name);
            println!("  App: {}", summary.app_name);
            println!("  Sink: {}", summary.sink);
            println!("  Log paths: {}", summary.log_path_count);
            println!("  Queue capacity: {}", summary.queue_capacity);
            println!("  HTTP server: {}", summary.http_address);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
