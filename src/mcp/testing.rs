//! In-process MCP server speaking the HTTP + SSE transport, for tests.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::Stream;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use super::transport::ToolEndpoint;

#[derive(Default)]
struct ServerState {
    streams: Mutex<HashMap<String, mpsc::UnboundedSender<Event>>>,
    calls: Mutex<Vec<String>>,
}

pub(crate) struct McpTestServer {
    addr: std::net::SocketAddr,
    state: Arc<ServerState>,
}

impl McpTestServer {
    pub(crate) async fn start() -> Self {
        let state = Arc::new(ServerState::default());
        let app = Router::new()
            .route("/sse", get(open_stream))
            .route("/messages", post(receive_message))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        McpTestServer { addr, state }
    }

    pub(crate) fn endpoint(&self) -> ToolEndpoint {
        format!("http://{}/sse", self.addr).parse().unwrap()
    }

    /// Names of the tools invoked so far, in order
    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.calls.lock().unwrap().clone()
    }
}

async fn open_stream(
    State(state): State<Arc<ServerState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = uuid::Uuid::new_v4().to_string();
    let (tx, rx) = mpsc::unbounded_channel();

    tx.send(
        Event::default()
            .event("endpoint")
            .data(format!("/messages?session_id={}", session_id)),
    )
    .ok();
    state.streams.lock().unwrap().insert(session_id, tx);

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (Ok(event), rx))
    });
    Sse::new(stream)
}

async fn receive_message(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<HashMap<String, String>>,
    Json(message): Json<Value>,
) -> StatusCode {
    let Some(id) = message.get("id").cloned() else {
        // Notification
        return StatusCode::ACCEPTED;
    };

    let method = message["method"].as_str().unwrap_or_default();
    let body = match method {
        "initialize" => json!({
            "result": {
                "protocolVersion": "2024-11-05",
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "test-server", "version": "0.0.1"}
            }
        }),
        "tools/list" => json!({
            "result": {
                "tools": [
                    {
                        "name": "send_email",
                        "description": "Send an email",
                        "inputSchema": {
                            "$schema": "http://json-schema.org/draft-07/schema#",
                            "type": "object",
                            "properties": {
                                "to": {"type": "string"},
                                "body": {"type": "string"}
                            },
                            "required": ["to", "body"],
                            "additionalProperties": false
                        }
                    },
                    {
                        "name": "fail",
                        "description": "Always fails",
                        "inputSchema": {"type": "object", "properties": {}}
                    }
                ]
            }
        }),
        "tools/call" => {
            let name = message["params"]["name"].as_str().unwrap_or_default().to_string();
            state.calls.lock().unwrap().push(name.clone());
            if name == "fail" {
                json!({"result": {"content": [{"type": "text", "text": "boom"}], "isError": true}})
            } else {
                json!({"result": {"content": [{"type": "text", "text": "sent"}]}})
            }
        }
        _ => json!({"error": {"code": -32601, "message": "method not found"}}),
    };

    let mut reply = body;
    reply["jsonrpc"] = json!("2.0");
    reply["id"] = id;

    let Some(session_id) = query.get("session_id") else {
        return StatusCode::BAD_REQUEST;
    };
    let streams = state.streams.lock().unwrap();
    match streams.get(session_id) {
        Some(tx) => {
            tx.send(Event::default().event("message").data(reply.to_string()))
                .ok();
            StatusCode::ACCEPTED
        }
        None => StatusCode::NOT_FOUND,
    }
}
