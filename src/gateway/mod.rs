//! HTTP gateway
//!
//! Exposes the orchestrator over HTTP. Every request runs its own chat turn
//! with its own tool session, so concurrent requests never share state.
//!
//! ```text
//! POST /v1/chat   {"message": "..."}  ->  {"reply": "...", "tool_called": ...}
//! GET  /v1/tools                      ->  [{"name": ..., "description": ...}]
//! GET  /health                        ->  {"status": "ok", "version": ...}
//! ```

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::orchestrator::ChatOrchestrator;

// ---- Error Handling ----

struct AppError(Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            warn!("Chat turn failed: {}", self.0);
        }
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        AppError(err)
    }
}

// ---- Request / Response Types ----

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    #[serde(default)]
    pub tool_called: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
}

// ---- Handlers ----

async fn chat(
    State(orchestrator): State<Arc<ChatOrchestrator>>,
    Json(request): Json<ChatRequest>,
) -> std::result::Result<Json<ChatReply>, AppError> {
    if request.message.trim().is_empty() {
        return Err(AppError(Error::ToolArgument("message must not be empty".into())));
    }

    let (reply, trace) = orchestrator.handle_with_trace(&request.message).await?;
    Ok(Json(ChatReply {
        reply,
        tool_called: trace.tool_called,
    }))
}

async fn list_tools(
    State(orchestrator): State<Arc<ChatOrchestrator>>,
) -> std::result::Result<Json<Vec<ToolSummary>>, AppError> {
    let tools = orchestrator.list_tools().await?;
    Ok(Json(
        tools
            .into_iter()
            .map(|t| ToolSummary {
                name: t.name,
                description: t.description,
            })
            .collect(),
    ))
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
    }))
}

// ---- Router ----

/// Build the gateway router around a shared orchestrator
pub fn build_router(orchestrator: Arc<ChatOrchestrator>) -> Router {
    let api = Router::new()
        .route("/chat", post(chat))
        .route("/tools", get(list_tools));

    Router::new()
        .route("/health", get(health_check))
        .nest("/v1", api)
        .with_state(orchestrator)
        .layer(CorsLayer::permissive())
}

/// Bind and serve until the process stops
pub async fn serve(config: &GatewayConfig, orchestrator: Arc<ChatOrchestrator>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.bind, config.port)
        .parse()
        .map_err(|e| Error::Config(format!("Invalid gateway address: {}", e)))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Gateway listening on http://{}", addr);

    axum::serve(listener, build_router(orchestrator)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::mcp::{testing::McpTestServer, McpSessionFactory};
    use crate::model::OpenAiClient;
    use serde_json::{json, Value};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn spawn_gateway(model_url: &str, tools: &McpTestServer) -> String {
        let model = OpenAiClient::new(ModelConfig {
            base_url: Some(model_url.to_string()),
            ..ModelConfig::default()
        })
        .unwrap();
        let orchestrator = ChatOrchestrator::new(
            Arc::new(model),
            Arc::new(McpSessionFactory::new(Duration::from_secs(5))),
            tools.endpoint(),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(Arc::new(orchestrator)))
                .await
                .ok();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_chat_endpoint() {
        let tools = McpTestServer::start().await;
        let model = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "meta-llama-3.1-8b-instruct",
                "choices": [{"message": {"role": "assistant", "content": "4"}}]
            })))
            .mount(&model)
            .await;

        let base = spawn_gateway(&model.uri(), &tools).await;
        let client = reqwest::Client::new();

        let reply: ChatReply = client
            .post(format!("{}/v1/chat", base))
            .json(&json!({"message": "What is 2+2?"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(reply.reply, "4");
        assert!(reply.tool_called.is_none());
        assert!(tools.calls().is_empty());

        let listed: Vec<ToolSummary> = client
            .get(format!("{}/v1/tools", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listed[0].name, "send_email");

        let health: Value = client
            .get(format!("{}/health", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
    }

    #[tokio::test]
    async fn test_errors_map_to_status_codes() {
        let tools = McpTestServer::start().await;
        let model = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
            .mount(&model)
            .await;

        let base = spawn_gateway(&model.uri(), &tools).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{}/v1/chat", base))
            .json(&json!({"message": "hello"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 502);

        let response = client
            .post(format!("{}/v1/chat", base))
            .json(&json!({"message": "  "}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 422);
    }
}
