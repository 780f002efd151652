//! `info` command implementation.

use anyhow::Context;
use cache_store::{CacheStats, CacheStore};
use config_loader::ConfigLoader;
use contracts::AgentConfig;
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::InfoArgs;
use crate::error::Result;

const REDACTED: &str = "***";

/// Cache state for JSON output
#[derive(Serialize)]
struct CacheInfo {
    path: String,
    entries: u64,
    retrying: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    oldest_age_secs: Option<f64>,
}

impl CacheInfo {
    fn new(path: String, stats: &CacheStats) -> Self {
        Self {
            path,
            entries: stats.entries,
            retrying: stats.retrying,
            oldest_age_secs: stats.oldest_age.map(|age| age.as_secs_f64()),
        }
    }
}

#[derive(Serialize)]
struct ConfigInfo<'a> {
    config: &'a AgentConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache: Option<CacheInfo>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<i32> {
    let mut config = super::load_config(args.config.as_deref())?;
    redact(&mut config);
    let cache = cache_info(&config);

    if args.json {
        let info = ConfigInfo {
            config: &config,
            cache,
        };
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{json}");
    } else {
        println!("# Effective configuration");
        println!("{}", ConfigLoader::to_toml(&config)?);
        print_cache_info(cache.as_ref());
    }

    Ok(0)
}

fn redact(config: &mut AgentConfig) {
    if config.reporter.api_key.is_some() {
        config.reporter.api_key = Some(REDACTED.to_string());
    }
}

/// Stats of the on-disk cache, if there is one
fn cache_info(config: &AgentConfig) -> Option<CacheInfo> {
    let path = &config.cache.storage_path;
    if !config.cache.enabled || !path.exists() {
        return None;
    }
    let stats = CacheStore::open(path, config.cache.max_entries, config.cache.max_age())
        .and_then(|store| store.stats());
    match stats {
        Ok(stats) => {
            info!(path = %path.display(), entries = stats.entries, "Cache inspected");
            Some(CacheInfo::new(path.display().to_string(), &stats))
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read cache");
            None
        }
    }
}

fn print_cache_info(cache: Option<&CacheInfo>) {
    println!("# Offline cache");
    match cache {
        Some(cache) => {
            println!("#   path: {}", cache.path);
            println!("#   pending entries: {}", cache.entries);
            println!("#   retried at least once: {}", cache.retrying);
            match cache.oldest_age_secs {
                Some(age) => println!("#   oldest entry: {age:.0}s ago"),
                None => println!("#   oldest entry: -"),
            }
        }
        None => println!("#   no cache file"),
    }
}
