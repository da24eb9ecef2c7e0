mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = parse_config(&content)
        .with_context(|| format!("Failed to load config file: {:?}", path))?;

    tracing::debug!("Loaded config from {:?}", path);
    Ok(config)
}

/// Parse and validate configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Invalid TOML")?;
    validate_config(&config)?;
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./lanplay.toml",
        "./config.toml",
        "~/.config/lanplay/config.toml",
        "/etc/lanplay/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    let config = Config::default();
    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.delivery.video_codec.trim().is_empty() {
        anyhow::bail!("delivery.video_codec cannot be empty");
    }
    if config.delivery.audio_codec.trim().is_empty() {
        anyhow::bail!("delivery.audio_codec cannot be empty");
    }

    if config.library.extensions.is_empty() {
        anyhow::bail!("library.extensions must list at least one extension");
    }

    if !config.library.root.is_dir() {
        tracing::warn!("Library root does not exist: {:?}", config.library.root);
    }

    if let Some(dir) = &config.server.static_dir {
        if !dir.is_dir() {
            tracing::warn!("Static directory does not exist: {:?}", dir);
        }
    }

    Ok(())
}
