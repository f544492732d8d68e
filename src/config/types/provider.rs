//! Model provider configuration
//!
//! One model endpoint per process. Base URL and model name fall back to
//! dialect-specific defaults when unset.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::schema::SchemaDialect;

/// Default OpenAI-compatible endpoint (a local LM Studio server)
pub const DEFAULT_OPENAI_URL: &str = "http://localhost:1234/v1";
/// Default OpenAI-compatible model
pub const DEFAULT_OPENAI_MODEL: &str = "meta-llama-3.1-8b-instruct";
/// Default Gemini endpoint
pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Default Gemini model
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

fn default_secret() -> SecretString {
    SecretString::from(String::new())
}

/// Model endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Function-calling dialect of the endpoint
    #[serde(default)]
    pub dialect: SchemaDialect,
    /// API key
    #[serde(skip_serializing, default = "default_secret")]
    pub api_key: SecretString,
    /// Model identifier; dialect default when unset
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL; dialect default when unset
    #[serde(default)]
    pub base_url: Option<String>,
    /// Sampling temperature, zero for repeatable answers
    #[serde(default)]
    pub temperature: f32,
    /// Maximum tokens to generate
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Bound on each completion request
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Standing instructions for every conversation
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            dialect: SchemaDialect::default(),
            api_key: default_secret(),
            model: None,
            base_url: None,
            temperature: 0.0,
            max_tokens: None,
            timeout: default_timeout(),
            system_prompt: None,
        }
    }
}

impl ModelConfig {
    /// Model identifier in effect
    pub fn model_name(&self) -> &str {
        match (&self.model, self.dialect) {
            (Some(model), _) => model,
            (None, SchemaDialect::ToolCalls) => DEFAULT_OPENAI_MODEL,
            (None, SchemaDialect::ContentParts) => DEFAULT_GEMINI_MODEL,
        }
    }

    /// Base URL in effect, without a trailing slash
    pub fn endpoint_url(&self) -> &str {
        let url = match (&self.base_url, self.dialect) {
            (Some(url), _) => url.as_str(),
            (None, SchemaDialect::ToolCalls) => DEFAULT_OPENAI_URL,
            (None, SchemaDialect::ContentParts) => DEFAULT_GEMINI_URL,
        };
        url.trim_end_matches('/')
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(120)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_dialect() {
        let mut config = ModelConfig::default();
        assert_eq!(config.model_name(), DEFAULT_OPENAI_MODEL);
        assert_eq!(config.endpoint_url(), DEFAULT_OPENAI_URL);

        config.dialect = SchemaDialect::ContentParts;
        assert_eq!(config.model_name(), "gemini-2.0-flash");
        assert_eq!(config.endpoint_url(), DEFAULT_GEMINI_URL);

        config.base_url = Some("http://proxy.local/v1beta/".into());
        assert_eq!(config.endpoint_url(), "http://proxy.local/v1beta");
    }

    #[test]
    fn test_timeout_parses_humantime() {
        let config: ModelConfig =
            serde_json::from_value(serde_json::json!({"dialect": "gemini", "timeout": "45s"}))
                .unwrap();
        assert_eq!(config.dialect, SchemaDialect::ContentParts);
        assert_eq!(config.timeout, Duration::from_secs(45));
    }
}
