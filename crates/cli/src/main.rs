//! # logship
//!
//! 节点日志采集代理的命令行入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 管道编排与生命周期管理
//! - SIGINT / SIGTERM 优雅关闭

use anyhow::Result;
use clap::Parser;
use tracing::info;

use logship_cli::cli::{Cli, Commands};
use logship_cli::commands::{run_agent, run_info, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    observability::init_tracing(&observability::TracingConfig {
        log_format: cli.log_format.into(),
        default_log_level: cli.default_log_level(),
    })?;

    info!(version = env!("CARGO_PKG_VERSION"), "logship starting");

    let result = match &cli.command {
        Commands::Run(args) => run_agent(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = format!("{e:#}"), "Command failed");
    }

    result
}
