//! Environment overrides
//!
//! Variables named `EDGE_AGENT_<KEY>` or `EDGE_AGENT_<SECTION>_<KEY>` replace
//! the matching option. Values are typed by the option they target.

use std::collections::BTreeMap;

use contracts::{AgentConfig, ContractError};
use serde_json::Value;

use crate::parser;

/// Prefix shared by every override variable
pub const ENV_PREFIX: &str = "EDGE_AGENT_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Str,
    Bool,
    Int,
    Float,
    List,
}

impl Kind {
    /// Type of an option, read from its default value
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::String(_) | Value::Null => Some(Self::Str),
            Value::Bool(_) => Some(Self::Bool),
            Value::Number(n) if n.is_u64() => Some(Self::Int),
            Value::Number(_) => Some(Self::Float),
            Value::Array(_) => Some(Self::List),
            Value::Object(_) => None,
        }
    }
}

/// Options absent from the serialized defaults (unset `Option`s)
const OPTIONAL: &[(&str, Kind)] = &[("reporter.api_key", Kind::Str)];

/// One overridable option: variable name (without prefix), path, type
#[derive(Debug, Clone, PartialEq)]
struct Target {
    name: String,
    path: Vec<String>,
    kind: Kind,
}

/// Every leaf of the defaults tree becomes `<SECTION>_<KEY>`
fn targets(defaults: &Value) -> Vec<Target> {
    let mut out = Vec::new();
    collect(defaults, &mut Vec::new(), &mut out);
    for (dotted, kind) in OPTIONAL {
        let path: Vec<String> = dotted.split('.').map(String::from).collect();
        if !out.iter().any(|t| t.path == path) {
            out.push(Target {
                name: path.join("_").to_ascii_uppercase(),
                path,
                kind: *kind,
            });
        }
    }
    out
}

fn collect(value: &Value, prefix: &mut Vec<String>, out: &mut Vec<Target>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                prefix.push(key.clone());
                collect(child, prefix, out);
                prefix.pop();
            }
        }
        leaf => {
            if let Some(kind) = Kind::of(leaf) {
                out.push(Target {
                    name: prefix.join("_").to_ascii_uppercase(),
                    path: prefix.clone(),
                    kind,
                });
            }
        }
    }
}

/// Snapshot of `EDGE_AGENT_*` variables
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    vars: BTreeMap<String, String>,
}

impl EnvOverrides {
    /// Capture the process environment
    pub fn from_env() -> Self {
        Self::from_pairs(std::env::vars())
    }

    /// Build from explicit pairs (tests, embedding)
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| k.starts_with(ENV_PREFIX))
            .collect();
        Self { vars }
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Names of recognised variables that are set
    pub fn applied_keys(&self) -> Vec<String> {
        let Ok(defaults) = parser::defaults() else {
            return Vec::new();
        };
        targets(&defaults)
            .into_iter()
            .map(|t| format!("{ENV_PREFIX}{}", t.name))
            .filter(|name| self.vars.contains_key(name))
            .collect()
    }

    /// Write every recognised variable into the value tree.
    ///
    /// Each value is checked on its own against the defaults, so a value the
    /// target field cannot hold (wrong type, out of range, unknown variant)
    /// is reported under the variable's name.
    ///
    /// # Errors
    /// `ConfigValidation` naming the offending variable.
    pub fn apply(&self, root: &mut Value) -> Result<(), ContractError> {
        let defaults = parser::defaults()?;
        for target in targets(&defaults) {
            let name = format!("{ENV_PREFIX}{}", target.name);
            let Some(raw) = self.vars.get(&name) else {
                continue;
            };
            let value = convert(&name, raw, target.kind)?;
            let path: Vec<&str> = target.path.iter().map(String::as_str).collect();

            let mut check = defaults.clone();
            parser::set_path(&mut check, &path, value.clone());
            if let Err(e) = serde_json::from_value::<AgentConfig>(check) {
                return Err(ContractError::config_validation(
                    name,
                    format!("'{}' does not fit {}: {e}", raw.trim(), target.path.join(".")),
                ));
            }

            parser::set_path(root, &path, value);
        }
        Ok(())
    }
}

fn convert(name: &str, raw: &str, kind: Kind) -> Result<Value, ContractError> {
    let raw = raw.trim();
    let invalid = |expected: &str| {
        ContractError::config_validation(name, format!("expected {expected}, got '{raw}'"))
    };
    match kind {
        Kind::Str => Ok(Value::String(raw.to_string())),
        Kind::Bool => parse_bool(raw).map(Value::Bool).ok_or_else(|| invalid("a boolean")),
        Kind::Int => raw
            .parse::<u64>()
            .map(Value::from)
            .map_err(|_| invalid("a non-negative integer")),
        Kind::Float => raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Value::from)
            .ok_or_else(|| invalid("a number")),
        Kind::List => Ok(Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
        )),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
