//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Apply node identity overrides from the environment
//! - Validate configuration legality
//! - Generate `AgentConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("config.toml")).unwrap();
//! println!("Node: {}", config.agent.node_name);
//! ```

mod env;
mod parser;
mod validator;

pub use contracts::AgentConfig;
pub use env::{apply_env_overrides, apply_overrides_from, NAMESPACE_ENV, NODE_NAME_ENV, POD_NAME_ENV};
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json), then
    /// applies `NODE_NAME` / `POD_NAME` / `POD_NAMESPACE` before validating.
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<AgentConfig, ContractError> {
        Self::load_from_path_with(path, |_| {})
    }

    /// Load configuration from file path, letting the caller adjust it
    /// (e.g. CLI flags) after environment overrides and before validation
    pub fn load_from_path_with<F>(path: &Path, adjust: F) -> Result<AgentConfig, ContractError>
    where
        F: FnOnce(&mut AgentConfig),
    {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        let mut config = parser::parse(&content, format)?;
        apply_env_overrides(&mut config);
        adjust(&mut config);
        validator::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from string
    ///
    /// No environment overrides are applied here.
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<AgentConfig, ContractError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// Re-run validation, e.g. after CLI overrides
    pub fn validate(config: &AgentConfig) -> Result<(), ContractError> {
        validator::validate(config)
    }

    /// Log path patterns that do not parse as globs, with their index
    pub fn malformed_patterns(config: &AgentConfig) -> Vec<(usize, String)> {
        validator::malformed_patterns(config)
    }

    /// Serialize AgentConfig to TOML string
    pub fn to_toml(config: &AgentConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize AgentConfig to JSON string
    pub fn to_json(config: &AgentConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }
}
