//! Tool session lifecycle
//!
//! A session owns exactly one live connection to a tool server and moves
//! between two states: closed and open. Tool enumerations belong to the
//! connection they were fetched on and are dropped on disconnect.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::client::McpClient;
use super::protocol::{ToolDescriptor, ToolInvocationResult};
use super::transport::ToolEndpoint;
use crate::error::{Error, Result};

/// Connect / list / call / disconnect against one tool endpoint
#[async_trait]
pub trait ToolSession: Send {
    /// Open the connection and complete the protocol handshake.
    /// Fails with [`Error::SessionState`] if the session is already open.
    async fn connect(&mut self, endpoint: &ToolEndpoint) -> Result<()>;

    /// Enumerate the server's tools, in server order
    async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>>;

    /// Invoke a tool from the most recent enumeration. Never retried.
    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<ToolInvocationResult>;

    /// Release the connection. A no-op on a closed session.
    async fn disconnect(&mut self) -> Result<()>;

    /// Whether a connection is currently held
    fn is_open(&self) -> bool;
}

/// Creates a fresh, closed session for each chat turn
pub trait SessionFactory: Send + Sync {
    fn create(&self) -> Box<dyn ToolSession>;
}

enum SessionState {
    Closed,
    Open {
        client: McpClient,
        /// Latest enumeration on this connection
        tools: Option<Vec<ToolDescriptor>>,
    },
}

/// [`ToolSession`] backed by an MCP server
pub struct McpSession {
    state: SessionState,
    timeout: Duration,
    /// Bumped on every successful connect
    generation: u64,
}

impl McpSession {
    /// Create a closed session whose network calls are bounded by `timeout`
    pub fn new(timeout: Duration) -> Self {
        McpSession {
            state: SessionState::Closed,
            timeout,
            generation: 0,
        }
    }

    /// Number of connections this session has opened so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn open_state(&mut self, op: &str) -> Result<(&McpClient, &mut Option<Vec<ToolDescriptor>>)> {
        match &mut self.state {
            SessionState::Open { client, tools } => Ok((client, tools)),
            SessionState::Closed => Err(Error::SessionState(format!(
                "cannot {} on a closed tool session",
                op
            ))),
        }
    }
}

#[async_trait]
impl ToolSession for McpSession {
    async fn connect(&mut self, endpoint: &ToolEndpoint) -> Result<()> {
        if let SessionState::Open { client, .. } = &self.state {
            return Err(Error::SessionState(format!(
                "tool session already connected to {}",
                client.name()
            )));
        }

        let client = McpClient::connect(endpoint, self.timeout).await?;
        self.generation += 1;
        debug!("Tool session generation {} open on {}", self.generation, endpoint);

        self.state = SessionState::Open {
            client,
            tools: None,
        };
        Ok(())
    }

    async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>> {
        let (client, cached) = self.open_state("list tools")?;
        let tools = client.list_tools().await?;

        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        info!("Available server tools: {:?}", names);

        *cached = Some(tools.clone());
        Ok(tools)
    }

    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<ToolInvocationResult> {
        let (client, cached) = self.open_state("call a tool")?;

        let known = cached
            .as_ref()
            .is_some_and(|tools| tools.iter().any(|t| t.name == name));
        if !known {
            return Err(Error::ToolNotFound(name.to_string()));
        }

        let result = client.call_tool(name, arguments).await?;
        if result.is_error {
            return Err(Error::ToolExecution {
                tool: name.to_string(),
                message: result.text(),
            });
        }

        Ok(result)
    }

    async fn disconnect(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Open { client, .. } => client.close().await,
            SessionState::Closed => Ok(()),
        }
    }

    fn is_open(&self) -> bool {
        matches!(self.state, SessionState::Open { .. })
    }
}

impl Drop for McpSession {
    fn drop(&mut self) {
        // The transport tears itself down when dropped; this only flags the leak.
        if self.is_open() {
            warn!("Tool session dropped while still connected");
        }
    }
}

/// Factory producing [`McpSession`]s
#[derive(Debug, Clone)]
pub struct McpSessionFactory {
    timeout: Duration,
}

impl McpSessionFactory {
    pub fn new(timeout: Duration) -> Self {
        McpSessionFactory { timeout }
    }
}

impl SessionFactory for McpSessionFactory {
    fn create(&self) -> Box<dyn ToolSession> {
        Box::new(McpSession::new(self.timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::testing::McpTestServer;
    use serde_json::json;

    fn session() -> McpSession {
        McpSession::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_full_lifecycle_over_sse() {
        let server = McpTestServer::start().await;
        let mut session = session();

        session.connect(&server.endpoint()).await.unwrap();
        assert!(session.is_open());
        assert_eq!(session.generation(), 1);

        let tools = session.list_tools().await.unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["send_email", "fail"]);

        let result = session
            .call_tool("send_email", json!({"to": "bob@example.com", "body": "hi"}))
            .await
            .unwrap();
        assert_eq!(result.text(), "sent");
        assert_eq!(server.calls(), vec!["send_email".to_string()]);

        session.disconnect().await.unwrap();
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn test_operations_on_closed_session_fail() {
        let mut session = session();
        assert!(matches!(
            session.list_tools().await,
            Err(Error::SessionState(_))
        ));
        assert!(matches!(
            session.call_tool("send_email", json!({})).await,
            Err(Error::SessionState(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_twice_is_state_error() {
        let server = McpTestServer::start().await;
        let mut session = session();
        session.connect(&server.endpoint()).await.unwrap();

        assert!(matches!(
            session.connect(&server.endpoint()).await,
            Err(Error::SessionState(_))
        ));
        assert_eq!(session.generation(), 1);
        session.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let server = McpTestServer::start().await;
        let mut session = session();
        session.connect(&server.endpoint()).await.unwrap();

        session.disconnect().await.unwrap();
        assert!(!session.is_open());
        session.disconnect().await.unwrap();
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn test_call_requires_enumeration_on_current_connection() {
        let server = McpTestServer::start().await;
        let mut session = session();
        session.connect(&server.endpoint()).await.unwrap();

        // Not yet enumerated
        assert!(matches!(
            session.call_tool("send_email", json!({})).await,
            Err(Error::ToolNotFound(_))
        ));

        session.list_tools().await.unwrap();
        session.disconnect().await.unwrap();
        session.connect(&server.endpoint()).await.unwrap();
        assert_eq!(session.generation(), 2);

        // The enumeration from the previous connection does not carry over
        assert!(matches!(
            session.call_tool("send_email", json!({})).await,
            Err(Error::ToolNotFound(_))
        ));
        assert!(server.calls().is_empty());
        session.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_invoked() {
        let server = McpTestServer::start().await;
        let mut session = session();
        session.connect(&server.endpoint()).await.unwrap();
        session.list_tools().await.unwrap();

        let err = session.call_tool("rm_rf", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::ToolNotFound(name) if name == "rm_rf"));
        assert!(server.calls().is_empty());
        session.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_tool_error_result_is_execution_error() {
        let server = McpTestServer::start().await;
        let mut session = session();
        session.connect(&server.endpoint()).await.unwrap();
        session.list_tools().await.unwrap();

        let err = session.call_tool("fail", json!({})).await.unwrap_err();
        match err {
            Error::ToolExecution { tool, message } => {
                assert_eq!(tool, "fail");
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        session.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_connection_error() {
        // Bind then drop a listener so the port is known to be closed
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let endpoint: ToolEndpoint = format!("http://127.0.0.1:{}/sse", port).parse().unwrap();
        let mut session = session();
        assert!(matches!(
            session.connect(&endpoint).await,
            Err(Error::Connection(_))
        ));
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn test_silent_server_times_out_on_connect() {
        // Accepts sockets and never writes a byte back
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let endpoint: ToolEndpoint = format!("http://{}/sse", addr).parse().unwrap();
        let mut session = McpSession::new(Duration::from_millis(200));
        let outcome = tokio::time::timeout(Duration::from_secs(3), session.connect(&endpoint))
            .await
            .expect("connect must give up on its own timeout");

        assert!(matches!(outcome, Err(Error::Timeout(_))));
        assert!(!session.is_open());
        assert_eq!(session.generation(), 0);
    }
}
