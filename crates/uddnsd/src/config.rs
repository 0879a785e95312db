//! Configuration file discovery and loading
//!
//! The first existing file wins, in this order:
//!
//! 1. `-c/--config PATH`
//! 2. `$UDDNS_CONFIG`
//! 3. `./uddns.yaml`
//! 4. `$HOME/.config/uddns.yaml`
//! 5. `/etc/uddns.yaml`
//!
//! `$UDDNS_INTERVAL` overrides the file's `interval`.

use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uddns_core::UddnsConfig;

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "UDDNS_CONFIG";

/// Environment variable overriding the poll interval
pub const INTERVAL_ENV: &str = "UDDNS_INTERVAL";

const CONFIG_FILE: &str = "uddns.yaml";

/// Implicit search locations, in priority order
pub fn search_paths(env_path: Option<PathBuf>, home: Option<PathBuf>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(path) = env_path.filter(|p| !p.as_os_str().is_empty()) {
        paths.push(path);
    }
    paths.push(PathBuf::from(CONFIG_FILE));
    if let Some(home) = home {
        paths.push(home.join(".config").join(CONFIG_FILE));
    }
    paths.push(PathBuf::from("/etc").join(CONFIG_FILE));
    paths
}

/// Pick the config file to use
///
/// An explicit path is used as-is, even if it does not exist, so a typo
/// fails loudly instead of silently falling through to another file.
pub fn locate(explicit: Option<&Path>, search: &[PathBuf]) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    for candidate in search {
        if candidate.is_file() {
            return Ok(candidate.clone());
        }
        debug!("No config at {}", candidate.display());
    }

    let searched: Vec<String> = search.iter().map(|p| p.display().to_string()).collect();
    anyhow::bail!(
        "No configuration file found. Searched: {}. Pass one with -c/--config or {}",
        searched.join(", "),
        CONFIG_ENV
    )
}

/// Parse and validate a config file
pub fn load_from_file(path: &Path) -> Result<UddnsConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config: UddnsConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    Ok(config)
}

/// Apply environment overrides on top of the file
pub fn apply_overrides(config: &mut UddnsConfig, interval: Option<String>) {
    if let Some(interval) = interval.filter(|i| !i.trim().is_empty()) {
        debug!("{} overrides interval: {}", INTERVAL_ENV, interval);
        config.interval = Some(interval);
    }
}

/// Discover, load, override and validate the configuration
pub fn load(explicit: Option<&Path>) -> Result<UddnsConfig> {
    let search = search_paths(env::var_os(CONFIG_ENV).map(PathBuf::from), dirs::home_dir());
    let path = locate(explicit, &search)?;

    let mut config = load_from_file(&path)?;
    apply_overrides(&mut config, env::var(INTERVAL_ENV).ok());
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;

    info!("Loaded config from: {}", path.display());
    Ok(config)
}
