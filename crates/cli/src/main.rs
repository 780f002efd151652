//! # Edge Agent CLI
//!
//! Command-line entry point.
//!
//! Provides:
//! - Layered configuration loading and validation
//! - Agent lifecycle with graceful Ctrl-C / SIGTERM shutdown
//! - Exit codes: 0 clean, 1 failure, 2 configuration, 3 fatal source

mod cli;
mod commands;
mod error;

use std::process::ExitCode;

use clap::Parser;
use observability::ObservabilityConfig;
use tracing::{error, info};

use cli::{Cli, Commands};
use commands::{run_agent, run_info, run_validate};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("{e:#}");
        return ExitCode::from(1);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Edge agent CLI starting");

    let result = match &cli.command {
        Commands::Run(args) => run_agent(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    match result {
        Ok(code) => exit_code(code),
        Err(e) => {
            error!(error = %e, "Command failed");
            exit_code(e.exit_code())
        }
    }
}

/// Initialize logging based on CLI options
fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let default_log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        // the run command installs the exporter itself
        metrics_port: None,
        default_log_level: default_log_level.to_string(),
        respect_env: !cli.quiet,
    })
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
