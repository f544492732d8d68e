//! HTTP + SSE transport for MCP
//!
//! The client opens a long-lived `GET` event stream. The server's first
//! event (`endpoint`) names the URI that requests must be POSTed to;
//! responses then arrive on the stream as `message` events and are routed
//! back to the waiting request by JSON-RPC id.

use async_trait::async_trait;
use eventsource_stream::{Event, Eventsource};
use futures::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use super::Transport;
use crate::error::{Error, Result};
use crate::mcp::protocol::{McpNotification, McpRequest, McpResponse};

/// Requests waiting for their response. `None` once the stream has ended.
type Pending = Arc<Mutex<Option<HashMap<u64, oneshot::Sender<McpResponse>>>>>;

/// SSE transport for remote MCP servers
pub struct SseTransport {
    http: reqwest::Client,
    /// URI announced by the `endpoint` event
    post_url: Url,
    pending: Pending,
    reader: Mutex<Option<JoinHandle<()>>>,
    timeout: Duration,
}

impl SseTransport {
    /// Open the event stream and wait for the server to announce its POST endpoint
    pub async fn connect(url: Url, timeout: Duration) -> Result<Self> {
        debug!("Opening MCP SSE stream: {}", url);

        // No overall timeout on the client: the event stream stays open for
        // the lifetime of the session. POSTs carry their own timeout.
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()?;

        let opening = http
            .get(url.clone())
            .header(ACCEPT, "text/event-stream")
            .send();
        let response = tokio::time::timeout(timeout, opening)
            .await
            .map_err(|_| {
                Error::Timeout(format!("MCP server {} did not answer within {:?}", url, timeout))
            })?
            .map_err(|e| Error::Connection(format!("Failed to reach MCP server {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Connection(format!(
                "MCP server {} refused the event stream (HTTP {})",
                url, status
            )));
        }

        let mut events = Box::pin(response.bytes_stream().eventsource());

        let post_url = tokio::time::timeout(timeout, async {
            while let Some(event) = events.next().await {
                let event = event
                    .map_err(|e| Error::Connection(format!("MCP SSE stream error: {}", e)))?;
                if event.event == "endpoint" {
                    return url.join(event.data.trim()).map_err(|e| {
                        Error::Connection(format!("Invalid endpoint URI '{}': {}", event.data, e))
                    });
                }
                debug!("Skipping SSE event '{}' before endpoint", event.event);
            }
            Err(Error::Connection(
                "MCP SSE stream closed before announcing its endpoint".to_string(),
            ))
        })
        .await
        .map_err(|_| {
            Error::Timeout(format!("No endpoint event from {} within {:?}", url, timeout))
        })??;

        debug!("MCP SSE endpoint for {}: {}", url, post_url);

        let pending: Pending = Arc::new(Mutex::new(Some(HashMap::new())));
        let reader = tokio::spawn(reader_loop(events, Arc::clone(&pending)));

        Ok(SseTransport {
            http,
            post_url,
            pending,
            reader: Mutex::new(Some(reader)),
            timeout,
        })
    }

    /// The URI requests are POSTed to
    pub fn post_url(&self) -> &Url {
        &self.post_url
    }

    async fn post<T: serde::Serialize>(&self, body: &T) -> Result<()> {
        let response = self
            .http
            .post(self.post_url.clone())
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("POST to {} timed out", self.post_url))
                } else {
                    Error::Connection(format!("Failed to POST to MCP server: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Connection(format!(
                "MCP server rejected message (HTTP {}): {}",
                status, text
            )));
        }

        Ok(())
    }

    fn shutdown(&self) {
        if let Some(reader) = self
            .reader
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            reader.abort();
        }
        // Dropping the senders wakes every waiting request with an error.
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn request(&self, request: McpRequest) -> Result<McpResponse> {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            let map = pending
                .as_mut()
                .ok_or_else(|| Error::Connection("MCP SSE stream is closed".to_string()))?;
            map.insert(request.id, tx);
        }
        // Removes the waiter if this future fails or is dropped mid-flight
        let _guard = PendingGuard {
            pending: Arc::clone(&self.pending),
            id: request.id,
        };

        self.post(&request).await?;

        rx.await.map_err(|_| {
            Error::Connection(format!(
                "MCP SSE stream closed before the response to '{}'",
                request.method
            ))
        })
    }

    async fn notify(&self, notification: McpNotification) -> Result<()> {
        self.post(&notification).await
    }

    async fn close(&self) -> Result<()> {
        debug!("Closing MCP SSE stream to {}", self.post_url);
        self.shutdown();
        Ok(())
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Drops the pending entry for `id` when the request ends, however it ends
struct PendingGuard {
    pending: Pending,
    id: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(map) = pending.as_mut() {
            map.remove(&self.id);
        }
    }
}

/// Route `message` events to their waiting requests until the stream ends
async fn reader_loop<S, E>(mut events: S, pending: Pending)
where
    S: Stream<Item = std::result::Result<Event, E>> + Unpin,
    E: Display,
{
    while let Some(item) = events.next().await {
        let event = match item {
            Ok(event) => event,
            Err(e) => {
                warn!("MCP SSE stream error: {}", e);
                break;
            }
        };

        if event.event != "message" {
            debug!("Ignoring SSE event '{}'", event.event);
            continue;
        }

        let response: McpResponse = match serde_json::from_str(&event.data) {
            Ok(response) => response,
            Err(e) => {
                warn!("Ignoring unparseable MCP message: {} (raw: {})", e, event.data);
                continue;
            }
        };

        // Server-initiated requests number their ids independently of ours
        if let Some(ref method) = response.method {
            debug!("Ignoring MCP server request '{}': {}", method, event.data);
            continue;
        }

        let Some(id) = response.id else {
            debug!("Ignoring server notification: {}", event.data);
            continue;
        };

        let waiter = pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_mut()
            .and_then(|map| map.remove(&id));

        match waiter {
            Some(tx) => {
                let _ = tx.send(response);
            }
            None => debug!("No pending request for MCP response id {}", id),
        }
    }

    debug!("MCP SSE stream ended");
    pending.lock().unwrap_or_else(|e| e.into_inner()).take();
}
