//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Edge agent - captures frames, runs inference and reports detections
#[derive(Parser, Debug)]
#[command(
    name = "edge-agent",
    author,
    version,
    about = "Edge data-collection and reporting agent",
    long_about = "Reads frames from a folder, video file, camera or network stream, runs \n\
                  them through an inference engine and delivers the detections to a \n\
                  remote endpoint in batches. Undeliverable batches are cached on disk \n\
                  and resent when the endpoint is reachable again."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "EDGE_AGENT_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "EDGE_AGENT_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the agent until the source ends or a stop signal arrives
    Run(RunArgs),

    /// Validate configuration without running
    Validate(ValidateArgs),

    /// Display the effective configuration and cache state
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); defaults apply without one
    #[arg(short, long, env = "EDGE_AGENT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the device identifier
    #[arg(long)]
    pub device_id: Option<String>,

    /// Override the source path (folder, file, device or stream address)
    #[arg(long)]
    pub source_path: Option<String>,

    /// Override the reporting endpoint
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Override the source rate limit in frames per second (0 = unpaced)
    #[arg(long)]
    pub rate_limit: Option<f64>,

    /// Loop finite sources
    #[arg(long = "loop")]
    pub looping: bool,

    /// Log batches instead of sending them and keep the cache in memory
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "EDGE_AGENT_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, env = "EDGE_AGENT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, env = "EDGE_AGENT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON instead of TOML
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
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
