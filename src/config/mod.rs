//! Configuration module
//!
//! - types/mod.rs: Core configuration types (Config, GatewayConfig)
//! - types/provider.rs: Model endpoint configuration
//! - types/tools.rs: Tool server configuration
//! - io.rs: Configuration loading and saving
//! - validation.rs: Configuration validation
//! - paths.rs: Configuration file paths

mod io;
mod paths;
mod types;
mod validation;

pub use types::{Config, GatewayConfig};
pub use types::provider::{
    ModelConfig, DEFAULT_GEMINI_MODEL, DEFAULT_GEMINI_URL, DEFAULT_OPENAI_MODEL, DEFAULT_OPENAI_URL,
};
pub use types::tools::ToolsConfig;

pub use io::{apply_env_overrides, load_config, load_config_at, load_config_from_path, save_config};
pub use paths::{config_dir, config_path};
pub use validation::{validate_config, ConfigValidationResult, ValidationIssue};
