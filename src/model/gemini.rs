//! Gemini `generateContent` client
//!
//! Speaks the content-parts dialect: a tool request is a `functionCall` part
//! in a `model` turn, and the result goes back as a `functionResponse` part
//! in a `user` turn.

use async_trait::async_trait;
use reqwest::{header, Client};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::{arguments_object, Conversation, GenerationOptions, ModelClient, ModelResponse, ToolInvocationRequest, Turn};
use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::schema::{tools_payload, SchemaDialect};

/// One turn on the wire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// A content part; exactly one field is set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCallPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponsePart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCallPart {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionResponsePart {
    pub name: String,
    pub response: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Content,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u64,
    #[serde(default)]
    pub candidates_token_count: u64,
}

fn text_part(text: impl Into<String>) -> Part {
    Part {
        text: Some(text.into()),
        ..Part::default()
    }
}

/// Render a conversation into wire contents
fn to_contents(conversation: &Conversation) -> Vec<Content> {
    conversation
        .turns()
        .iter()
        .map(|turn| match turn {
            Turn::User { text } => Content {
                role: Some("user".to_string()),
                parts: vec![text_part(text.clone())],
            },
            Turn::Assistant { text } => Content {
                role: Some("model".to_string()),
                parts: vec![text_part(text.clone())],
            },
            Turn::FunctionCall { call } => Content {
                role: Some("model".to_string()),
                parts: vec![Part {
                    function_call: Some(FunctionCallPart {
                        name: call.name.clone(),
                        args: call.arguments_value(),
                    }),
                    ..Part::default()
                }],
            },
            // Results travel in a user turn; the endpoint pairs them by name
            Turn::FunctionResult { name, content, .. } => Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    function_response: Some(FunctionResponsePart {
                        name: name.clone(),
                        response: json!({ "result": content }),
                    }),
                    ..Part::default()
                }],
            },
        })
        .collect()
}

/// Completion from a Gemini endpoint
#[derive(Debug, Clone)]
pub struct GeminiResponse {
    parts: Vec<Part>,
    /// Ids minted on receipt; Gemini calls carry none
    call_ids: Vec<String>,
}

impl GeminiResponse {
    /// Take the first candidate of a raw response
    pub fn from_response(response: GenerateContentResponse) -> Result<Self> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::ModelEndpoint("no candidates in response".to_string()))?;

        let parts = candidate.content.parts;
        let call_ids = parts
            .iter()
            .filter(|p| p.function_call.is_some())
            .map(|_| uuid::Uuid::new_v4().to_string())
            .collect();

        Ok(GeminiResponse { parts, call_ids })
    }

    fn function_calls(&self) -> impl Iterator<Item = &FunctionCallPart> {
        self.parts.iter().filter_map(|p| p.function_call.as_ref())
    }
}

impl ModelResponse for GeminiResponse {
    fn text(&self) -> Option<String> {
        let text: String = self
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }

    fn requested_tool_call(&self) -> Result<Option<ToolInvocationRequest>> {
        let Some(first) = self.function_calls().next() else {
            return Ok(None);
        };

        let count = self.tool_call_count();
        if count > 1 {
            warn!(
                "Model requested {} tool calls; only '{}' will be executed",
                count, first.name
            );
        }

        let arguments: Map<String, Value> = arguments_object(&first.name, first.args.clone())?;
        Ok(Some(ToolInvocationRequest::new(
            self.call_ids[0].clone(),
            &first.name,
            arguments,
        )))
    }

    fn tool_call_count(&self) -> usize {
        self.call_ids.len()
    }
}

/// Gemini API client
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    config: ModelConfig,
}

impl GeminiClient {
    /// Create a new client
    pub fn new(config: ModelConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            header::HeaderValue::from_str(config.api_key.expose_secret())
                .map_err(|e| Error::Config(format!("Invalid API key format: {}", e)))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(GeminiClient { client, config })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint_url(),
            self.config.model_name()
        )
    }

    async fn send_request(&self, request: &GenerateContentRequest) -> Result<GenerateContentResponse> {
        let url = self.api_url();

        debug!(model = %self.model(), contents = request.contents.len(), "Gemini API request");

        let response = self.client.post(&url).json(request).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(format!("completion request to {}", url))
            } else {
                Error::ModelEndpoint(format!("Request to {} failed: {}", url, e))
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let text = response.text().await.unwrap_or_default();
            warn!("Rate limit exceeded: {}", text);
            return Err(Error::ModelEndpoint(format!("Rate limited: {}", text)));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::ModelEndpoint(format!("HTTP {}: {}", status, text)));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::ModelEndpoint(format!("Malformed completion response: {}", e)))?;

        if let Some(ref usage) = body.usage_metadata {
            info!(
                input_tokens = usage.prompt_token_count,
                output_tokens = usage.candidates_token_count,
                "Gemini response"
            );
        }

        Ok(body)
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn dialect(&self) -> SchemaDialect {
        SchemaDialect::ContentParts
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
        let request = GenerateContentRequest {
            contents: to_contents(conversation),
            system_instruction: conversation.system.as_ref().map(|s| Content {
                role: None,
                parts: vec![text_part(s.clone())],
            }),
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_tokens,
            },
            tools: (!tools.is_empty()).then(|| tools_payload(tools, SchemaDialect::ContentParts)),
        };

        let response = self.send_request(&request).await?;
        Ok(Box::new(GeminiResponse::from_response(response)?))
    }
}
