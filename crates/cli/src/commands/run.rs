//! `run` command implementation.

use agent::Agent;
use anyhow::Context;
use config_loader::ConfigLoader;
use contracts::{AgentConfig, StopSignal};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::Result;

const DRY_RUN_ENDPOINT: &str = "log://dry-run";

/// Execute the `run` command, returning the process exit code
pub async fn run_agent(args: &RunArgs) -> Result<i32> {
    let mut config = super::load_config(args.config.as_deref())?;
    apply_overrides(&mut config, args);
    ConfigLoader::validate(&config)?;

    info!(
        device_id = %config.device_id,
        source_type = %config.source.source_type,
        source_path = %config.source.path,
        engine = %config.inference.engine,
        endpoint = %config.reporter.endpoint,
        cache_enabled = config.cache.enabled,
        "Configuration loaded"
    );

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)
            .context("Failed to start metrics endpoint")?;
    }

    let stop = StopSignal::new();
    tokio::spawn(trigger_on_shutdown_signal(stop.clone()));

    let agent = Agent::with_stop(config, stop);
    let report = agent.run().await?;

    println!("\n{report}");
    info!(
        reason = report.reason.as_str(),
        exit_code = report.exit_code(),
        "Edge agent finished"
    );
    Ok(report.exit_code())
}

/// CLI flags win over file and environment
fn apply_overrides(config: &mut AgentConfig, args: &RunArgs) {
    if let Some(ref device_id) = args.device_id {
        info!(device_id = %device_id, "Overriding device id from CLI");
        config.device_id = device_id.clone();
    }
    if let Some(ref path) = args.source_path {
        info!(path = %path, "Overriding source path from CLI");
        config.source.path = path.clone();
    }
    if let Some(ref endpoint) = args.endpoint {
        info!(endpoint = %endpoint, "Overriding endpoint from CLI");
        config.reporter.endpoint = endpoint.clone();
    }
    if let Some(rate_limit) = args.rate_limit {
        info!(rate_limit, "Overriding rate limit from CLI");
        config.source.rate_limit = rate_limit;
    }
    if args.looping {
        config.source.looping = true;
    }
    if args.dry_run {
        info!("Dry run: batches are logged, cache kept in memory");
        config.reporter.endpoint = DRY_RUN_ENDPOINT.to_string();
        config.cache.enabled = false;
    }
}

/// Trigger `stop` on Ctrl-C or SIGTERM
async fn trigger_on_shutdown_signal(stop: StopSignal) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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

    warn!("Received shutdown signal, draining");
    stop.trigger();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> RunArgs {
        RunArgs {
            config: None,
            device_id: None,
            source_path: None,
            endpoint: None,
            rate_limit: None,
            looping: false,
            dry_run: false,
            metrics_port: 0,
        }
    }

    #[test]
    fn test_overrides_replace_loaded_values() {
        let mut config = AgentConfig::default();
        let args = RunArgs {
            device_id: Some("edge-042".to_string()),
            source_path: Some("/data/frames".to_string()),
            endpoint: Some("https://collector.example/api".to_string()),
            rate_limit: Some(5.0),
            looping: true,
            ..args()
        };
        apply_overrides(&mut config, &args);

        assert_eq!(config.device_id, "edge-042");
        assert_eq!(config.source.path, "/data/frames");
        assert_eq!(config.reporter.endpoint, "https://collector.example/api");
        assert_eq!(config.source.rate_limit, 5.0);
        assert!(config.source.looping);
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_dry_run_uses_log_transport_and_memory_cache() {
        let mut config = AgentConfig::default();
        let args = RunArgs {
            endpoint: Some("https://collector.example/api".to_string()),
            dry_run: true,
            ..args()
        };
        apply_overrides(&mut config, &args);

        assert_eq!(config.reporter.endpoint, DRY_RUN_ENDPOINT);
        assert!(!config.cache.enabled);
        assert!(ConfigLoader::validate(&config).is_ok());
    }
}
