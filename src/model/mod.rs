//! Model endpoint clients
//!
//! Two completion APIs are supported, one per function-calling dialect:
//! - OpenAI-compatible `/chat/completions` (LM Studio, vLLM, OpenAI, ...)
//! - Gemini `generateContent`
//!
//! Responses are exposed through [`ModelResponse`] so the orchestrator never
//! reaches into vendor-specific shapes.

mod gemini;
mod openai;
mod types;

pub use gemini::{GeminiClient, GeminiResponse};
pub use openai::{OpenAiClient, OpenAiResponse};
pub use types::*;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::schema::SchemaDialect;

/// A completion returned by a model endpoint
pub trait ModelResponse: Send + Sync {
    /// Text content, if the model produced any
    fn text(&self) -> Option<String>;

    /// The tool call the model asked for, if any.
    ///
    /// Only the first call is returned; any further calls in the same
    /// response are ignored. Malformed arguments fail with
    /// [`Error::ToolArgument`](crate::Error::ToolArgument).
    fn requested_tool_call(&self) -> Result<Option<ToolInvocationRequest>>;

    /// Number of tool calls the response contains
    fn tool_call_count(&self) -> usize;
}

/// A request/response completion API
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Function-calling dialect this endpoint speaks
    fn dialect(&self) -> SchemaDialect;

    /// Model identifier sent with each request
    fn model(&self) -> &str;

    /// Run one completion over `conversation`.
    ///
    /// `tools` are function schemas already translated to [`Self::dialect`].
    async fn complete(
        &self,
        conversation: &Conversation,
        tools: &[Value],
        options: &GenerationOptions,
    ) -> Result<Box<dyn ModelResponse>>;
}

/// Build the client matching the configured dialect
pub fn build_client(config: &ModelConfig) -> Result<Arc<dyn ModelClient>> {
    match config.dialect {
        SchemaDialect::ToolCalls => Ok(Arc::new(OpenAiClient::new(config.clone())?)),
        SchemaDialect::ContentParts => Ok(Arc::new(GeminiClient::new(config.clone())?)),
    }
}

/// Parse a JSON-encoded argument string into an argument map
pub(crate) fn parse_arguments(tool: &str, raw: &str) -> Result<serde_json::Map<String, Value>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(serde_json::Map::new());
    }

    let value: Value = serde_json::from_str(raw).map_err(|e| {
        crate::Error::ToolArgument(format!("arguments for '{}' are not valid JSON: {}", tool, e))
    })?;
    arguments_object(tool, value)
}

/// Require the arguments to be a JSON object
pub(crate) fn arguments_object(tool: &str, value: Value) -> Result<serde_json::Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(serde_json::Map::new()),
        other => Err(crate::Error::ToolArgument(format!(
            "arguments for '{}' must be an object, got {}",
            tool, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_parse_arguments() {
        let args = parse_arguments("send_email", r#"{"to": "bob@example.com"}"#).unwrap();
        assert_eq!(args["to"], "bob@example.com");
        assert!(parse_arguments("noop", "").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_arguments_are_rejected() {
        assert!(matches!(
            parse_arguments("send_email", "{to: bob"),
            Err(Error::ToolArgument(_))
        ));
        assert!(matches!(
            parse_arguments("send_email", "[1, 2]"),
            Err(Error::ToolArgument(_))
        ));
    }
}
