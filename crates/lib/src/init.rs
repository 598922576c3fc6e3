//! Initialize the configuration directory: create ~/.kagami, a default
//! config file, and the media staging directory.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes a `config.json` template with empty sections if missing.
/// - Creates the `media` subdirectory.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        let template = serde_json::to_string_pretty(&Config::default())
            .context("rendering default config")?;
        std::fs::write(config_path, template)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let media_dir = config_dir.join("media");
    if !media_dir.exists() {
        std::fs::create_dir_all(&media_dir)
            .with_context(|| format!("creating media directory {}", media_dir.display()))?;
        log::info!("created media directory at {}", media_dir.display());
    }

    Ok(config_dir.to_path_buf())
}
