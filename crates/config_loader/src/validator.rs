//! Config validation
//!
//! Rules:
//! - field ranges declared on the config structs (`validator` derive)
//! - numeric options are finite
//! - source path scheme matches the source type (tcp/http streams, stub or /dev cameras)
//! - model artifact exists for non-stub engines
//! - endpoint scheme is http, https or log
//! - retry delays are ordered

use std::borrow::Cow;

use contracts::{AgentConfig, ContractError, SourceType};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate an AgentConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &AgentConfig) -> Result<(), ContractError> {
    validate_declared(config)?;
    validate_finite(config)?;
    validate_source(config)?;
    validate_inference(config)?;
    validate_reporter(config)?;
    validate_cache(config)?;
    Ok(())
}

/// Run the derived field rules and report the first violation
fn validate_declared(config: &AgentConfig) -> Result<(), ContractError> {
    match config.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let (field, message) = first_violation(&errors, "")
                .unwrap_or_else(|| ("config".to_string(), errors.to_string()));
            Err(ContractError::config_validation(field, message))
        }
    }
}

fn first_violation(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut entries: Vec<(&Cow<'static, str>, &ValidationErrorsKind)> =
        errors.errors().iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in entries {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(error) = list.first() {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string());
                    return Some((path, message));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                if let Some(found) = first_violation(inner, &path) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    if let Some(found) = first_violation(inner, &format!("{path}[{idx}]")) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

fn validate_finite(config: &AgentConfig) -> Result<(), ContractError> {
    let checks = [
        ("source.rate_limit", config.source.rate_limit),
        ("source.native_fps", config.source.native_fps),
        ("reporter.timeout_secs", config.reporter.timeout_secs),
        ("reporter.retry_initial_delay_secs", config.reporter.retry_initial_delay_secs),
        ("reporter.retry_backoff", config.reporter.retry_backoff),
        ("reporter.retry_max_delay_secs", config.reporter.retry_max_delay_secs),
        ("reporter.batch_interval_secs", config.reporter.batch_interval_secs),
        ("reporter.drain_interval_secs", config.reporter.drain_interval_secs),
        ("cache.max_age_hours", config.cache.max_age_hours),
        (
            "inference.confidence_threshold",
            f64::from(config.inference.confidence_threshold),
        ),
        ("inference.iou_threshold", f64::from(config.inference.iou_threshold)),
    ];
    for (field, value) in checks {
        if !value.is_finite() {
            return Err(ContractError::config_validation(
                field,
                format!("must be a finite number, got {value}"),
            ));
        }
    }
    Ok(())
}

/// Slowest accepted pacing: one frame per day
const MIN_RATE_LIMIT: f64 = 1.0 / 86_400.0;

const NETWORK_SCHEMES: &[&str] = &["tcp://", "http://"];
const CAMERA_PREFIXES: &[&str] = &["stub://", "/dev/"];

fn validate_source(config: &AgentConfig) -> Result<(), ContractError> {
    let source = &config.source;
    if source.rate_limit > 0.0 && source.rate_limit < MIN_RATE_LIMIT {
        return Err(ContractError::config_validation(
            "source.rate_limit",
            format!(
                "must be 0 (unpaced) or at least one frame per day, got {}",
                source.rate_limit
            ),
        ));
    }
    match source.source_type {
        SourceType::NetworkStream
            if !NETWORK_SCHEMES.iter().any(|s| source.path.starts_with(s)) =>
        {
            return Err(ContractError::config_validation(
                "source.path",
                format!(
                    "network-stream path must be tcp://host:port or an http:// MJPEG url, got '{}'",
                    source.path
                ),
            ));
        }
        SourceType::Camera
            if !CAMERA_PREFIXES.iter().any(|p| source.path.starts_with(p)) =>
        {
            return Err(ContractError::config_validation(
                "source.path",
                format!(
                    "camera path must be stub://<name> or a /dev/ device node, got '{}'",
                    source.path
                ),
            ));
        }
        SourceType::Folder if source.extensions.is_empty() => {
            return Err(ContractError::config_validation(
                "source.extensions",
                "folder source needs at least one extension",
            ));
        }
        _ => {}
    }

    if source.reconnect_initial_delay_ms > source.reconnect_max_delay_ms {
        return Err(ContractError::config_validation(
            "source.reconnect_initial_delay_ms",
            format!(
                "initial delay ({}ms) must be <= max delay ({}ms)",
                source.reconnect_initial_delay_ms, source.reconnect_max_delay_ms
            ),
        ));
    }
    Ok(())
}

fn validate_inference(config: &AgentConfig) -> Result<(), ContractError> {
    let inference = &config.inference;
    let is_stub = inference.engine == "stub" || inference.engine.starts_with("stub:");
    if !is_stub && !inference.model_path.exists() {
        return Err(ContractError::config_validation(
            "inference.model_path",
            format!(
                "model file not found for engine '{}': {}",
                inference.engine,
                inference.model_path.display()
            ),
        ));
    }
    Ok(())
}

fn validate_reporter(config: &AgentConfig) -> Result<(), ContractError> {
    let reporter = &config.reporter;
    let endpoint = reporter.endpoint.as_str();
    let valid_scheme = ["http://", "https://", "log://"]
        .iter()
        .any(|scheme| endpoint.starts_with(scheme) && endpoint.len() > scheme.len());
    if !valid_scheme {
        return Err(ContractError::config_validation(
            "reporter.endpoint",
            format!("endpoint must be an http(s):// or log:// URL, got '{endpoint}'"),
        ));
    }

    if reporter.retry_initial_delay_secs > reporter.retry_max_delay_secs {
        return Err(ContractError::config_validation(
            "reporter.retry_initial_delay_secs",
            format!(
                "initial delay ({}) must be <= max delay ({})",
                reporter.retry_initial_delay_secs, reporter.retry_max_delay_secs
            ),
        ));
    }
    Ok(())
}

fn validate_cache(config: &AgentConfig) -> Result<(), ContractError> {
    if config.cache.enabled && config.cache.storage_path.as_os_str().is_empty() {
        return Err(ContractError::config_validation(
            "cache.storage_path",
            "storage_path must be set when the cache is enabled",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AgentConfig {
        AgentConfig::default()
    }

    fn field_of(err: ContractError) -> String {
        match err {
            ContractError::ConfigValidation { field, .. } => field,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_defaults_pass() {
        assert!(validate(&valid()).is_ok());
    }

    #[test]
    fn test_empty_device_id() {
        let mut config = valid();
        config.device_id.clear();
        assert_eq!(field_of(validate(&config).unwrap_err()), "device_id");
    }

    #[test]
    fn test_nested_field_path() {
        let mut config = valid();
        config.reporter.batch_size = 0;
        assert_eq!(field_of(validate(&config).unwrap_err()), "reporter.batch_size");
    }

    #[test]
    fn test_threshold_range() {
        let mut config = valid();
        config.inference.iou_threshold = 1.2;
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "inference.iou_threshold"
        );
    }

    #[test]
    fn test_nan_rate_limit() {
        let mut config = valid();
        config.source.rate_limit = f64::NAN;
        assert_eq!(field_of(validate(&config).unwrap_err()), "source.rate_limit");
    }

    #[test]
    fn test_rate_limit_too_slow() {
        let mut config = valid();
        config.source.rate_limit = 1e-30;
        assert_eq!(field_of(validate(&config).unwrap_err()), "source.rate_limit");

        config.source.rate_limit = 0.5;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_model_for_real_engine() {
        let mut config = valid();
        config.inference.engine = "onnx".to_string();
        config.inference.model_path = "/nonexistent/model.onnx".into();
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "inference.model_path"
        );
    }

    #[test]
    fn test_stub_engine_needs_no_model() {
        let mut config = valid();
        config.inference.engine = "stub:empty".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_network_stream_scheme() {
        let mut config = valid();
        config.source.source_type = SourceType::NetworkStream;
        config.source.path = "rtsp://camera/stream".to_string();
        assert_eq!(field_of(validate(&config).unwrap_err()), "source.path");

        config.source.path = "http://192.168.1.20:81/stream".to_string();
        assert!(validate(&config).is_ok());
        config.source.path = "tcp://127.0.0.1:9000".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_camera_path() {
        let mut config = valid();
        config.source.source_type = SourceType::Camera;
        config.source.path = "stub://front".to_string();
        assert!(validate(&config).is_ok());
        config.source.path = "/dev/video0".to_string();
        assert!(validate(&config).is_ok());

        config.source.path = "front-door".to_string();
        assert_eq!(field_of(validate(&config).unwrap_err()), "source.path");
    }

    #[test]
    fn test_endpoint_scheme() {
        let mut config = valid();
        config.reporter.endpoint = "ftp://example.com".to_string();
        assert_eq!(field_of(validate(&config).unwrap_err()), "reporter.endpoint");

        config.reporter.endpoint = "log://dry-run".to_string();
        assert!(validate(&config).is_ok());
    }
}
