//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::{AgentConfig, SinkConfig};
use tracing::{error, info};

use crate::cli::RunArgs;
use crate::pipeline::Pipeline;

/// Execute the `run` command
///
/// Returns `Ok` only when the pipeline stopped because of a signal.
pub async fn run_agent(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path_with(&args.config, |config| {
        if let Some(ref node_name) = args.node_name {
            info!(node_name = %node_name, "Overriding node name from CLI");
            config.agent.node_name = node_name.clone();
        }
    })
    .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        node = %config.agent.node_name,
        sink = config.sink.kind(),
        log_paths = config.collection.log_paths.len(),
        http_address = %config.http_server.address,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let metrics = observability::init_metrics()?;
    let pipeline = Pipeline::build(config, metrics)
        .await
        .context("Failed to start pipeline")?;

    let stats = pipeline
        .run_until(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        lines_read = stats.lines_read,
        delivered = stats.delivered,
        dropped = stats.dropped,
        duration_secs = stats.duration.as_secs_f64(),
        "Pipeline stopped"
    );
    stats.print_summary();

    info!("logship finished");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed is logged and never resolves, leaving
/// the other one in charge.
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C"),
            Err(e) => {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM");
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
///
/// Written to stderr like all other agent diagnostics.
fn print_config_summary(config: &AgentConfig) {
    eprintln!("\n=== Configuration Summary ===\n");
    eprintln!("Node: {}", config.agent.node_name);
    eprintln!("App: {}", config.agent.app_name);

    eprintln!("\nLog paths ({}):", config.collection.log_paths.len());
    for pattern in &config.collection.log_paths {
        eprintln!("  - {}", pattern);
    }

    match &config.sink {
        SinkConfig::Stdout => eprintln!("\nSink: stdout"),
        SinkConfig::Loki(loki) => eprintln!("\nSink: loki ({})", loki.url),
    }

    eprintln!("HTTP server: {}", config.http_server.address);
    eprintln!();
}
