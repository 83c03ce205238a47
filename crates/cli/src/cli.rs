//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Default location of the agent configuration inside the container image
pub const DEFAULT_CONFIG_PATH: &str = "/etc/logging-agent/config.toml";

/// logship - node-local log shipping agent
#[derive(Parser, Debug)]
#[command(
    name = "logship",
    author,
    version,
    about = "Node-local log shipping agent",
    long_about = "Tails log files matching configured glob patterns, turns every new line \n\
                  into a structured entry and delivers it to stdout or a Loki endpoint.\n\n\
                  Exposes /healthz, /status and /metrics while running."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "LOGSHIP_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log filter used when RUST_LOG is unset (e.g. "info", "tailer=debug")
    #[arg(long, global = true, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "json",
        global = true,
        env = "LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Filter applied when `RUST_LOG` does not override it
    pub fn default_log_level(&self) -> String {
        if self.quiet {
            return "warn".to_string();
        }
        if let Some(level) = &self.log_level {
            return level.clone();
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
        .to_string()
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the agent until SIGINT / SIGTERM
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "CONFIG_PATH")]
    pub config: PathBuf,

    /// Override the node name from configuration and NODE_NAME
    #[arg(long)]
    pub node_name: Option<String>,

    /// Validate configuration and exit without starting the pipeline
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "CONFIG_PATH")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "CONFIG_PATH")]
    pub config: PathBuf,

    /// Output the effective configuration as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    #[default]
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["logship", "run"]).unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
                assert!(args.node_name.is_none());
                assert!(!args.dry_run);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_log_level_precedence() {
        let quiet = Cli::try_parse_from(["logship", "-q", "--log-level", "debug", "run"]).unwrap();
        assert_eq!(quiet.default_log_level(), "warn");

        let explicit =
            Cli::try_parse_from(["logship", "-vv", "--log-level", "tailer=debug", "run"]).unwrap();
        assert_eq!(explicit.default_log_level(), "tailer=debug");

        let verbose = Cli::try_parse_from(["logship", "-v", "validate"]).unwrap();
        assert_eq!(verbose.default_log_level(), "debug");
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["logship", "-q", "-v", "run"]).is_err());
    }
}
