//! MCP client for connecting to MCP servers
//!
//! Speaks JSON-RPC over any [`Transport`]. Every round-trip is bounded by
//! the client timeout.

use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::protocol::{
    ListToolsResult, McpNotification, McpRequest, McpResponse, ToolDescriptor,
    ToolInvocationResult,
};
use super::transport::{ToolEndpoint, Transport};
use crate::error::{Error, Result};

/// Upper bound on `tools/list` pages followed for one enumeration
const MAX_LIST_PAGES: usize = 64;

/// MCP client for communicating with an MCP server
pub struct McpClient {
    transport: Arc<dyn Transport>,
    /// Request ID counter
    next_id: AtomicU64,
    /// Server name, for logs
    name: String,
    timeout: Duration,
}

impl McpClient {
    /// Open a transport to `endpoint` and perform the initialize handshake
    pub async fn connect(endpoint: &ToolEndpoint, timeout: Duration) -> Result<Self> {
        debug!("Connecting to MCP server: {}", endpoint);

        let transport = tokio::time::timeout(timeout, endpoint.open(timeout))
            .await
            .map_err(|_| {
                Error::Timeout(format!("Opening {} exceeded {:?}", endpoint, timeout))
            })??;
        let client = McpClient::with_transport(transport, endpoint.to_string(), timeout);

        if let Err(e) = client.initialize().await {
            if let Err(close_err) = client.close().await {
                warn!("Failed to close half-open MCP connection: {}", close_err);
            }
            return Err(match e {
                Error::Timeout(msg) => Error::Timeout(msg),
                Error::Connection(msg) => Error::Connection(msg),
                other => Error::Connection(format!("MCP handshake failed: {}", other)),
            });
        }

        Ok(client)
    }

    /// Wrap an already-open transport. The handshake is not performed.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        name: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        McpClient {
            transport,
            next_id: AtomicU64::new(1),
            name: name.into(),
            timeout,
        }
    }

    /// Send a request and wait for its response, bounded by the timeout
    async fn send_request(&self, request: McpRequest) -> Result<McpResponse> {
        let method = request.method.clone();
        debug!("MCP request -> {}: {}", self.name, method);

        let response = tokio::time::timeout(self.timeout, self.transport.request(request))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "MCP '{}' on {} exceeded {:?}",
                    method, self.name, self.timeout
                ))
            })??;

        debug!("MCP response <- {}: {}", self.name, method);
        Ok(response)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Initialize the MCP connection
    async fn initialize(&self) -> Result<()> {
        let response = self.send_request(McpRequest::initialize(self.next_id())).await?;

        if let Some(err) = response.error {
            return Err(Error::Connection(format!(
                "MCP server {} rejected initialize: {} (code {})",
                self.name, err.message, err.code
            )));
        }

        if let Some(result) = response.result {
            debug!("MCP server {} initialized: {}", self.name, result);
        }

        tokio::time::timeout(
            self.timeout,
            self.transport.notify(McpNotification::initialized()),
        )
        .await
        .map_err(|_| Error::Timeout(format!("MCP initialized notification to {}", self.name)))??;

        Ok(())
    }

    /// List available tools, following pagination cursors
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let request = McpRequest::list_tools(self.next_id(), cursor.as_deref());
            let response = self.send_request(request).await?;

            if let Some(err) = response.error {
                return Err(Error::Connection(format!(
                    "MCP tools/list failed on {}: {} (code {})",
                    self.name, err.message, err.code
                )));
            }

            let page: ListToolsResult =
                serde_json::from_value(response.result.unwrap_or_default()).map_err(|e| {
                    Error::Connection(format!("Malformed tools/list result: {}", e))
                })?;

            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        debug!("MCP server {} has {} tools", self.name, tools.len());
        Ok(tools)
    }

    /// Call a tool on the MCP server
    ///
    /// A JSON-RPC error is reported as [`Error::ToolExecution`]. A result
    /// flagged `isError` is returned as-is for the caller to judge.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolInvocationResult> {
        let request = McpRequest::call_tool(self.next_id(), name, arguments);
        let response = self.send_request(request).await?;

        if let Some(err) = response.error {
            return Err(Error::ToolExecution {
                tool: name.to_string(),
                message: format!("{} (code {})", err.message, err.code),
            });
        }

        let result: ToolInvocationResult =
            serde_json::from_value(response.result.unwrap_or_default()).map_err(|e| {
                Error::ToolExecution {
                    tool: name.to_string(),
                    message: format!("malformed tools/call result: {}", e),
                }
            })?;

        if result.is_error {
            warn!("MCP tool {} returned error", name);
        }

        Ok(result)
    }

    /// Close the underlying transport
    pub async fn close(&self) -> Result<()> {
        debug!("Closing MCP client for {}", self.name);
        self.transport.close().await
    }

    /// Get the server name
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Answers each request from a canned list, in order
    struct ScriptedTransport {
        replies: Mutex<Vec<Value>>,
        seen: Mutex<Vec<McpRequest>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Value>) -> Arc<Self> {
            Arc::new(ScriptedTransport {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn request(&self, request: McpRequest) -> Result<McpResponse> {
            let id = request.id;
            self.seen.lock().unwrap().push(request);
            let body = self
                .replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| Error::Connection("script exhausted".into()))?;
            let mut reply = json!({ "jsonrpc": "2.0", "id": id });
            for (k, v) in body.as_object().unwrap() {
                reply[k] = v.clone();
            }
            Ok(serde_json::from_value(reply)?)
        }

        async fn notify(&self, _notification: McpNotification) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn client(transport: Arc<ScriptedTransport>) -> McpClient {
        McpClient::with_transport(transport, "scripted", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_list_tools_follows_cursor() {
        let transport = ScriptedTransport::new(vec![
            json!({"result": {"tools": [{"name": "a"}], "nextCursor": "page-2"}}),
            json!({"result": {"tools": [{"name": "b"}]}}),
        ]);
        let tools = client(Arc::clone(&transport)).list_tools().await.unwrap();

        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].params.as_ref().unwrap()["cursor"], "page-2");
    }

    #[tokio::test]
    async fn test_call_tool_rpc_error_is_execution_error() {
        let transport = ScriptedTransport::new(vec![json!({
            "error": {"code": -32000, "message": "mailbox full"}
        })]);
        let err = client(transport)
            .call_tool("send_email", json!({}))
            .await
            .unwrap_err();

        match err {
            Error::ToolExecution { tool, message } => {
                assert_eq!(tool, "send_email");
                assert!(message.contains("mailbox full"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slow_transport_times_out() {
        struct Stalled;

        #[async_trait]
        impl Transport for Stalled {
            async fn request(&self, _request: McpRequest) -> Result<McpResponse> {
                futures::future::pending().await
            }
            async fn notify(&self, _n: McpNotification) -> Result<()> {
                Ok(())
            }
            async fn close(&self) -> Result<()> {
                Ok(())
            }
        }

        let client = McpClient::with_transport(Arc::new(Stalled), "stalled", Duration::from_millis(20));
        assert!(matches!(client.list_tools().await, Err(Error::Timeout(_))));
    }
}
