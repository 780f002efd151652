//! # Config Loader
//!
//! Configuration loading and layering.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Merge layers: built-in defaults, then file, then `EDGE_AGENT_*` environment
//! - Validate the merged result
//! - Produce one immutable `AgentConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::{ConfigLoader, EnvOverrides};
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_layered(
//!     Some(Path::new("edge-agent.toml")),
//!     &EnvOverrides::from_env(),
//! )
//! .unwrap();
//! println!("Device: {}", config.device_id);
//! ```

mod env;
mod parser;
mod validator;

pub use contracts::AgentConfig;
pub use env::{EnvOverrides, ENV_PREFIX};
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path, over built-in defaults.
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<AgentConfig, ContractError> {
        Self::load_layered(Some(path), &EnvOverrides::default())
    }

    /// Load configuration from string, over built-in defaults.
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<AgentConfig, ContractError> {
        let mut merged = parser::defaults()?;
        parser::merge(&mut merged, parser::parse(content, format)?);
        Self::finish(merged)
    }

    /// Assemble the full layer stack: defaults → file (optional) → environment.
    ///
    /// # Errors
    /// Any read, parse, override or validation failure.
    pub fn load_layered(
        path: Option<&Path>,
        env: &EnvOverrides,
    ) -> Result<AgentConfig, ContractError> {
        let mut merged = parser::defaults()?;
        if let Some(path) = path {
            let format = Self::detect_format(path)?;
            let content = Self::read_file(path)?;
            parser::merge(&mut merged, parser::parse(&content, format)?);
        }
        env.apply(&mut merged)?;
        Self::finish(merged)
    }

    /// Re-run validation on a config modified after loading (CLI overrides)
    pub fn validate(config: &AgentConfig) -> Result<(), ContractError> {
        validator::validate(config)
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
        std::fs::read_to_string(path).map_err(|e| ContractError::ConfigParse {
            message: format!("cannot read {}: {e}", path.display()),
            source: Some(Box::new(e)),
        })
    }

    fn finish(merged: serde_json::Value) -> Result<AgentConfig, ContractError> {
        let config = parser::into_config(merged)?;
        validator::validate(&config)?;
        Ok(config)
    }
}
