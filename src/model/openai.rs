//! OpenAI-compatible chat completions client
//!
//! Speaks the tool-calls dialect: tool requests arrive as `tool_calls` on the
//! assistant message and results go back as `role: "tool"` messages carrying
//! the call id.

use async_trait::async_trait;
use reqwest::{header, Client};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{parse_arguments, Conversation, GenerationOptions, ModelClient, ModelResponse, ToolInvocationRequest, Turn};
use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::schema::SchemaDialect;

/// Message on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// system, user, assistant or tool
    pub role: String,
    /// Text content; null on assistant messages that only call tools
    #[serde(default)]
    pub content: Option<String>,
    /// Tool name (tool messages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Call id this message answers (tool messages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Calls requested by the assistant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<AssistantToolCall>>,
}

impl Message {
    fn text(role: &str, content: impl Into<String>) -> Self {
        Message {
            role: role.to_string(),
            content: Some(content.into()),
            name: None,
            tool_call_id: None,
            tool_calls: None,
        }
    }
}

/// Tool call made by the assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantToolCall {
    /// Unique ID for this tool call
    #[serde(default)]
    pub id: String,
    /// Type of tool call (usually "function")
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    /// Function details
    pub function: FunctionCall,
}

/// Function call details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the function to call
    pub name: String,
    /// Arguments as JSON string
    #[serde(default)]
    pub arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

/// Request to `/chat/completions`
#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    temperature: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
}

/// Response from `/chat/completions`
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// A completion choice
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: Message,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token usage statistics
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Render a conversation into wire messages
fn to_messages(conversation: &Conversation) -> Vec<Message> {
    let mut messages = Vec::with_capacity(conversation.len() + 1);

    if let Some(ref system) = conversation.system {
        messages.push(Message::text("system", system.clone()));
    }

    for turn in conversation.turns() {
        let message = match turn {
            Turn::User { text } => Message::text("user", text.clone()),
            Turn::Assistant { text } => Message::text("assistant", text.clone()),
            Turn::FunctionCall { call } => Message {
                role: "assistant".to_string(),
                content: None,
                name: None,
                tool_call_id: None,
                tool_calls: Some(vec![AssistantToolCall {
                    id: call.id.clone(),
                    call_type: function_type(),
                    function: FunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments_value().to_string(),
                    },
                }]),
            },
            Turn::FunctionResult {
                call_id,
                name,
                content,
            } => Message {
                role: "tool".to_string(),
                content: Some(content.clone()),
                name: Some(name.clone()),
                tool_call_id: Some(call_id.clone()),
                tool_calls: None,
            },
        };
        messages.push(message);
    }

    messages
}

/// Completion from an OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct OpenAiResponse {
    message: Message,
}

impl OpenAiResponse {
    /// Take the first choice of a raw response
    pub fn from_completion(completion: ChatCompletionResponse) -> Result<Self> {
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::ModelEndpoint("response has no choices".to_string()))?;

        Ok(OpenAiResponse {
            message: choice.message,
        })
    }
}

impl ModelResponse for OpenAiResponse {
    fn text(&self) -> Option<String> {
        self.message
            .content
            .as_ref()
            .filter(|c| !c.trim().is_empty())
            .cloned()
    }

    fn requested_tool_call(&self) -> Result<Option<ToolInvocationRequest>> {
        let Some(calls) = self.message.tool_calls.as_ref() else {
            return Ok(None);
        };
        let Some(first) = calls.first() else {
            return Ok(None);
        };

        if calls.len() > 1 {
            warn!(
                "Model requested {} tool calls; only '{}' will be executed",
                calls.len(),
                first.function.name
            );
        }

        let arguments = parse_arguments(&first.function.name, &first.function.arguments)?;
        let id = if first.id.is_empty() {
            format!("call_{}", uuid::Uuid::new_v4().simple())
        } else {
            first.id.clone()
        };

        Ok(Some(ToolInvocationRequest::new(id, &first.function.name, arguments)))
    }

    fn tool_call_count(&self) -> usize {
        self.message.tool_calls.as_ref().map_or(0, Vec::len)
    }
}

/// OpenAI-compatible API client
#[derive(Clone)]
pub struct OpenAiClient {
    /// HTTP client
    client: Client,
    /// Configuration
    config: ModelConfig,
}

impl OpenAiClient {
    /// Create a new client
    pub fn new(config: ModelConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();

        // Local servers run without a key
        let key = config.api_key.expose_secret();
        if !key.is_empty() {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", key))
                    .map_err(|e| Error::Config(format!("Invalid API key format: {}", e)))?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(OpenAiClient { client, config })
    }

    async fn send_request(&self, request: ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let url = format!("{}/chat/completions", self.config.endpoint_url());

        debug!(
            "Sending completion request: model={}, messages={}",
            request.model,
            request.messages.len()
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(&url, e))?;

        let status = response.status();

        if status.is_success() {
            let body = response
                .json::<ChatCompletionResponse>()
                .await
                .map_err(|e| Error::ModelEndpoint(format!("Malformed completion response: {}", e)))?;

            if let Some(ref usage) = body.usage {
                info!(
                    "Completion response: model={}, tokens={}",
                    body.model, usage.total_tokens
                );
            }

            Ok(body)
        } else {
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                warn!("Rate limit exceeded: {}", error_text);
                Err(Error::ModelEndpoint(format!("Rate limited: {}", error_text)))
            } else if status.as_u16() == 401 {
                Err(Error::ModelEndpoint("Invalid API key".to_string()))
            } else {
                Err(Error::ModelEndpoint(format!(
                    "API error ({}): {}",
                    status, error_text
                )))
            }
        }
    }
}

/// Map a transport failure on a completion request
fn request_error(url: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(format!("completion request to {}", url))
    } else {
        Error::ModelEndpoint(format!("Request to {} failed: {}", url, e))
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    fn dialect(&self) -> SchemaDialect {
        SchemaDialect::ToolCalls
    }

    fn model(&self) -> &str {
        self.config.model_name()
    }

    async fn complete(
        &self,
        conversation: &Conversation,
        tools: &[Value],
        options: &GenerationOptions,
    ) -> Result<Box<dyn ModelResponse>> {
        let with_tools = !tools.is_empty();
        let request = ChatCompletionRequest {
            model: self.model().to_string(),
            messages: to_messages(conversation),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            stream: false,
            tools: with_tools.then(|| tools.to_vec()),
            tool_choice: with_tools.then(|| "auto".to_string()),
        };

        let completion = self.send_request(request).await?;
        Ok(Box::new(OpenAiResponse::from_completion(completion)?))
    }
}
