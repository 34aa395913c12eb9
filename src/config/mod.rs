mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

use crate::profiles::Profiles;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = parse_config(&content)
        .with_context(|| format!("Failed to load config file: {:?}", path))?;

    Ok(config)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;
    validate_config(&config)?;
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./assetforged.toml",
        "~/.config/assetforged/config.toml",
        "/etc/assetforged/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
///
/// Profiles are checked here so a malformed profile stops startup instead
/// of failing the first request that uses it.
fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    Profiles::from_config(&config.profiles).context("Invalid profile configuration")?;

    if config.delivery.cache && !config.delivery.cache_url_prefix.starts_with('/') {
        anyhow::bail!(
            "delivery.cache_url_prefix must be an absolute path, got {:?}",
            config.delivery.cache_url_prefix
        );
    }

    Ok(())
}
