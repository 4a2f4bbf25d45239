// Configuration loader
// Reads iris-monitor TOML from the first location that exists, then applies
// environment overrides

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::settings::Config;

/// Config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "iris-monitor.toml";

pub const ENV_BIND: &str = "IRIS_MONITOR_BIND";
pub const ENV_MODEL: &str = "IRIS_MONITOR_MODEL";
pub const ENV_LOG: &str = "IRIS_MONITOR_LOG";

/// Load configuration.
///
/// An explicit path must exist. Otherwise `./iris-monitor.toml`, then
/// `<config dir>/iris-monitor/config.toml`, then built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut config = match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            load_from_file(path)?
        }
        None => match default_locations().into_iter().find(|p| p.exists()) {
            Some(path) => load_from_file(&path)?,
            None => {
                debug!("No config file found, using defaults");
                Config::default()
            }
        },
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Parse one TOML file; missing sections and fields take their defaults
pub fn load_from_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    debug!(path = %path.display(), "Loaded config file");
    Ok(config)
}

fn default_locations() -> Vec<PathBuf> {
    let mut locations = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    if let Some(dir) = dirs::config_dir() {
        locations.push(dir.join("iris-monitor").join("config.toml"));
    }
    locations
}

/// Environment wins over the file; empty values are ignored
fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(bind) = get(ENV_BIND) {
        config.server.bind_address = bind;
    }
    if let Some(model) = get(ENV_MODEL) {
        config.model.path = PathBuf::from(model);
    }
    if let Some(level) = get(ENV_LOG) {
        config.logging.level = level;
    }
}
