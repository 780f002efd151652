//! `validate` command implementation.

use anyhow::Context;
use contracts::{AgentConfig, BackpressurePolicy, ContractError};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::error::Result;

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
    device_id: String,
    source_type: String,
    source_path: String,
    engine: String,
    endpoint: String,
    batch_size: usize,
    cache_enabled: bool,
    cache_path: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<i32> {
    let loaded = super::load_config(args.config.as_deref());
    let result = validation_result(args, &loaded);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{json}");
    } else {
        print_validation_result(&result);
    }

    loaded?;
    info!("Configuration is valid");
    Ok(0)
}

fn validation_result(
    args: &ValidateArgs,
    loaded: &std::result::Result<AgentConfig, ContractError>,
) -> ValidationResult {
    let config_path = args
        .config
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(defaults)".to_string());

    match loaded {
        Ok(config) => {
            let warnings = collect_warnings(config);
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
                    device_id: config.device_id.clone(),
                    source_type: config.source.source_type.to_string(),
                    source_path: config.source.path.clone(),
                    engine: config.inference.engine.clone(),
                    endpoint: config.reporter.endpoint.clone(),
                    batch_size: config.reporter.batch_size,
                    cache_enabled: config.cache.enabled,
                    cache_path: config.cache.storage_path.display().to_string(),
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

    if !config.cache.enabled {
        warnings.push(
            "cache.enabled is false - undelivered batches are kept in memory and lost on exit"
                .to_string(),
        );
    }

    if config.reporter.endpoint.starts_with("log://") {
        warnings.push("reporter.endpoint is a log:// endpoint - nothing is sent".to_string());
    }

    if config.reporter.backpressure == BackpressurePolicy::DropOldest
        && config.source.source_type.is_finite()
    {
        warnings.push(
            "reporter.backpressure = drop_oldest with a finite source may lose results"
                .to_string(),
        );
    }

    if config.source.looping && !config.source.source_type.is_finite() {
        warnings.push(format!(
            "source.loop has no effect for {} sources",
            config.source.source_type
        ));
    }

    if config.reporter.api_key.is_some() && config.reporter.endpoint.starts_with("http://") {
        warnings.push("reporter.api_key is sent over plain http".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Device: {}", summary.device_id);
            println!("  Source: {} ({})", summary.source_path, summary.source_type);
            println!("  Engine: {}", summary.engine);
            println!(
                "  Endpoint: {} (batch size {})",
                summary.endpoint, summary.batch_size
            );
            if summary.cache_enabled {
                println!("  Cache: {}", summary.cache_path);
            } else {
                println!("  Cache: in memory");
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {warning}");
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {error}");
        }
    }
}
