//! Configuration validation
//!
//! Validates configuration and reports issues.

use secrecy::ExposeSecret;

use super::types::Config;
use crate::schema::SchemaDialect;

/// Result of configuration validation
#[derive(Debug, Clone)]
pub struct ConfigValidationResult {
    /// Whether the config is valid
    pub valid: bool,
    /// Validation errors (critical)
    pub errors: Vec<ValidationIssue>,
    /// Validation warnings (non-critical)
    pub warnings: Vec<ValidationIssue>,
}

impl ConfigValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        ConfigValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add an error
    pub fn with_error(mut self, issue: ValidationIssue) -> Self {
        self.valid = false;
        self.errors.push(issue);
        self
    }

    /// Add a warning
    pub fn with_warning(mut self, issue: ValidationIssue) -> Self {
        self.warnings.push(issue);
        self
    }
}

/// A validation issue
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the config field
    pub path: String,
    /// Issue message
    pub message: String,
    /// Suggested fix
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Create a new issue
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> ConfigValidationResult {
    let mut result = ConfigValidationResult::valid();
    result = validate_model_config(config, result);
    result = validate_tools_config(config, result);
    result
}

fn validate_model_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    let model = &config.model;

    if !(0.0..=2.0).contains(&model.temperature) {
        result = result.with_error(ValidationIssue::new(
            "model.temperature",
            format!("Temperature {} is outside 0.0..=2.0", model.temperature),
        ));
    }

    if url::Url::parse(model.endpoint_url()).is_err() {
        result = result.with_error(ValidationIssue::new(
            "model.base_url",
            format!("Not a valid URL: {}", model.endpoint_url()),
        ));
    }

    if model.dialect == SchemaDialect::ContentParts && model.api_key.expose_secret().is_empty() {
        result = result.with_warning(
            ValidationIssue::new("model.api_key", "Gemini endpoints require an API key")
                .with_suggestion("Set TOOLCHAT_API_KEY or API_KEY"),
        );
    }

    result
}

fn validate_tools_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    if let Err(e) = config.tools.tool_endpoint() {
        result = result.with_error(
            ValidationIssue::new("tools.endpoint", e.to_string())
                .with_suggestion("Use an http(s) SSE URL or stdio:<command>"),
        );
    }

    if config.tools.timeout.is_zero() {
        result = result.with_error(ValidationIssue::new(
            "tools.timeout",
            "Tool timeout must be greater than zero",
        ));
    }

    result
}
