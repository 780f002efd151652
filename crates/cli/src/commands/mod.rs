//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_agent;
pub use validate::run_validate;

use std::path::Path;

use config_loader::{AgentConfig, ConfigLoader, EnvOverrides};
use contracts::ContractError;
use tracing::info;

/// Defaults, then the file (if any), then `EDGE_AGENT_*` variables
fn load_config(path: Option<&Path>) -> Result<AgentConfig, ContractError> {
    let env = EnvOverrides::from_env();
    match path {
        Some(path) => info!(config = %path.display(), "Loading configuration"),
        None => info!("No configuration file, using defaults"),
    }
    if !env.is_empty() {
        info!(variables = ?env.applied_keys(), "Environment overrides");
    }
    ConfigLoader::load_layered(path, &env)
}
