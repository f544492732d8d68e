//! MCP (Model Context Protocol) module
//!
//! Manages the connection to the remote tool server that executes the
//! tools a model asks for.
//!
//! ## Architecture
//!
//! - **transport**: SSE and stdio transports
//! - **protocol**: Wire protocol types (JSON-RPC based)
//! - **client**: JSON-RPC calls with timeouts
//! - **session**: connect / list / call / disconnect lifecycle
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use toolchat::mcp::{McpSession, ToolEndpoint, ToolSession};
//!
//! # async fn example() -> toolchat::Result<()> {
//! let endpoint: ToolEndpoint = "http://localhost:8931/sse".parse()?;
//! let mut session = McpSession::new(Duration::from_secs(30));
//! session.connect(&endpoint).await?;
//!
//! let tools = session.list_tools().await?;
//! let result = session
//!     .call_tool(&tools[0].name, serde_json::json!({"arg": "value"}))
//!     .await;
//! session.disconnect().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod protocol;
mod session;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::McpClient;
pub use protocol::{
    ContentBlock, McpNotification, McpRequest, McpResponse, ToolDescriptor,
    ToolInvocationResult, PROTOCOL_VERSION,
};
pub use session::{McpSession, McpSessionFactory, SessionFactory, ToolSession};
pub use transport::{SseTransport, StdioTransport, ToolEndpoint, Transport};
