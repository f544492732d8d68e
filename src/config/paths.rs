//! Configuration paths

use std::path::PathBuf;

/// Get the configuration directory
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("toolchat"))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".config").join("toolchat"))
                .unwrap_or_else(|| PathBuf::from(".toolchat"))
        })
}

/// Get the main configuration file path
pub fn config_path() -> PathBuf {
    // Check for explicit override
    if let Ok(path) = std::env::var("TOOLCHAT_CONFIG") {
        return PathBuf::from(path);
    }

    config_dir().join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_is_under_config_dir_by_default() {
        if std::env::var("TOOLCHAT_CONFIG").is_err() {
            assert!(config_path().starts_with(config_dir()));
        }
        assert!(config_dir().ends_with("toolchat"));
    }
}
