//! Config parsing and layer merging
//!
//! TOML (primary) and JSON are both parsed into a `serde_json::Value` tree so
//! defaults, file and environment layers merge the same way regardless of
//! format. The merged tree is deserialized once into `AgentConfig`.

use contracts::{AgentConfig, ContractError};
use serde_json::{Map, Value};

/// Config file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Infer format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse TOML into a value tree
pub fn parse_toml(content: &str) -> Result<Value, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse JSON into a value tree
pub fn parse_json(content: &str) -> Result<Value, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse by format; the document root must be a table/object
pub fn parse(content: &str, format: ConfigFormat) -> Result<Value, ContractError> {
    let value = match format {
        ConfigFormat::Toml => parse_toml(content)?,
        ConfigFormat::Json => parse_json(content)?,
    };
    if !value.is_object() {
        return Err(ContractError::config_parse(
            "configuration root must be a table",
        ));
    }
    Ok(value)
}

/// Built-in defaults as the bottom layer
pub fn defaults() -> Result<Value, ContractError> {
    serde_json::to_value(AgentConfig::default())
        .map_err(|e| ContractError::config_parse(format!("default config encode error: {e}")))
}

/// Recursively overlay `overlay` onto `base`. Tables merge key by key,
/// everything else is replaced.
pub fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Set a nested key, creating intermediate tables
pub fn set_path(root: &mut Value, path: &[&str], value: Value) {
    match path {
        [] => {}
        [last] => {
            if let Some(map) = ensure_object(root) {
                map.insert((*last).to_string(), value);
            }
        }
        [head, rest @ ..] => {
            if let Some(map) = ensure_object(root) {
                let child = map
                    .entry((*head).to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                set_path(child, rest, value);
            }
        }
    }
}

fn ensure_object(value: &mut Value) -> Option<&mut Map<String, Value>> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    value.as_object_mut()
}

/// Deserialize the merged tree
pub fn into_config(value: Value) -> Result<AgentConfig, ContractError> {
    serde_json::from_value(value).map_err(|e| ContractError::ConfigParse {
        message: format!("invalid configuration structure: {e}"),
        source: Some(Box::new(e)),
    })
}
