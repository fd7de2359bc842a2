//! Configuration file discovery
//!
//! Finds and loads the optional configuration file.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::AppConfig;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./apim-smoke.yaml",
    "./apim-smoke.yml",
    "./apim-smoke.json",
    "~/.config/apim-smoke/config.yaml",
];

/// Find configuration file in standard locations
pub fn find_config() -> Option<PathBuf> {
    CONFIG_LOCATIONS
        .iter()
        .map(|location| expand_path(location))
        .find(|path| path.exists())
}

/// Load the explicit config file, else the first one found, else defaults.
///
/// Returns the path that was loaded, if any.
pub fn resolve_config(explicit: Option<&Path>) -> Result<(AppConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config(),
    };

    match path {
        Some(path) => {
            debug!("Loading config from {}", path.display());
            let config = AppConfig::load(&path)?;
            Ok((config, Some(path)))
        }
        None => Ok((AppConfig::default(), None)),
    }
}

/// Expand ~ to home directory
pub(crate) fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
pub(crate) fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
