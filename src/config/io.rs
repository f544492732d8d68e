//! Configuration I/O - Loading and saving configuration
//!
//! Handles reading configuration from files and environment variables.

use secrecy::SecretString;
use std::path::Path;

use super::types::Config;
use crate::error::{Error, Result};

/// Load configuration with layered precedence:
/// 1. Config file if it exists, otherwise defaults
/// 2. Environment variable overrides (including `.env`)
pub fn load_config() -> Result<Config> {
    load_config_at(None)
}

/// Like [`load_config`], reading `path` instead of the default location.
///
/// An explicit path must exist; the default location is optional.
pub fn load_config_at(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => load_config_from_path(path)?,
        None => {
            let default_path = super::paths::config_path();
            if default_path.exists() {
                load_config_from_path(&default_path)?
            } else {
                Config::default()
            }
        }
    };

    // Load .env file if it exists
    dotenvy::dotenv().ok();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    Ok(config)
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    // Detect format by extension
    let config: Config = if path.extension().is_some_and(|ext| ext == "json") {
        // Parse as JSON5 (more lenient than strict JSON)
        json5::from_str(&content).map_err(|e| Error::Config(format!("Invalid JSON config: {}", e)))?
    } else if path.extension().is_some_and(|ext| ext == "toml") {
        toml::from_str(&content).map_err(|e| Error::Config(format!("Invalid TOML config: {}", e)))?
    } else {
        // Try JSON5 first, then TOML
        json5::from_str(&content)
            .or_else(|_| toml::from_str(&content).map_err(|e| Error::Config(e.to_string())))
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?
    };

    Ok(config)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` resolves a variable name; the loader passes `std::env::var`.
/// Unparseable values are configuration errors rather than being skipped.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dialect) = lookup("TOOLCHAT_DIALECT") {
        config.model.dialect = dialect.parse()?;
    }
    if let Some(model) = lookup("TOOLCHAT_MODEL") {
        config.model.model = Some(model);
    }
    if let Some(url) = lookup("TOOLCHAT_BASE_URL") {
        config.model.base_url = Some(url);
    }
    if let Some(key) = lookup("TOOLCHAT_API_KEY").or_else(|| lookup("API_KEY")) {
        config.model.api_key = SecretString::from(key);
    }
    if let Some(prompt) = lookup("TOOLCHAT_SYSTEM_PROMPT") {
        config.model.system_prompt = Some(prompt);
    }
    if let Some(temperature) = lookup("TOOLCHAT_TEMPERATURE") {
        config.model.temperature = temperature
            .parse()
            .map_err(|e| Error::Config(format!("Invalid TOOLCHAT_TEMPERATURE: {}", e)))?;
    }

    if let Some(endpoint) = lookup("TOOLCHAT_TOOL_ENDPOINT") {
        config.tools.endpoint = endpoint;
    }

    if let Some(port) = lookup("TOOLCHAT_GATEWAY_PORT") {
        config.gateway.port = port
            .parse()
            .map_err(|e| Error::Config(format!("Invalid TOOLCHAT_GATEWAY_PORT: {}", e)))?;
    }

    Ok(())
}

/// Save configuration to a file
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    let content = if path.extension().is_some_and(|ext| ext == "toml") {
        toml::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?
    } else {
        serde_json::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, content)?;
    Ok(())
}
