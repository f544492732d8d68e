//! MCP transport implementations
//!
//! A transport moves JSON-RPC messages between the client and one tool
//! server. Two are supported:
//!
//! - **sse**: HTTP + Server-Sent Events, the remote flavour used by hosted
//!   tool servers (`http://localhost:8931/sse`)
//! - **stdio**: a local subprocess speaking newline-delimited JSON

mod sse;
mod stdio;

pub use sse::SseTransport;
pub use stdio::StdioTransport;

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::protocol::{McpNotification, McpRequest, McpResponse};
use crate::error::{Error, Result};

/// Trait for MCP transports
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for the response carrying the same id
    async fn request(&self, request: McpRequest) -> Result<McpResponse>;

    /// Send a notification; no response is expected
    async fn notify(&self, notification: McpNotification) -> Result<()>;

    /// Release the underlying connection
    async fn close(&self) -> Result<()>;
}

/// Where the tool server lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolEndpoint {
    /// SSE endpoint URL
    Sse(Url),
    /// Subprocess command line
    Stdio { command: String, args: Vec<String> },
}

impl ToolEndpoint {
    /// Open a transport to this endpoint
    pub async fn open(&self, timeout: Duration) -> Result<Arc<dyn Transport>> {
        match self {
            ToolEndpoint::Sse(url) => {
                let transport = SseTransport::connect(url.clone(), timeout).await?;
                Ok(Arc::new(transport))
            }
            ToolEndpoint::Stdio { command, args } => {
                let transport = StdioTransport::spawn(command, args)?;
                Ok(Arc::new(transport))
            }
        }
    }
}

impl FromStr for ToolEndpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();

        if let Some(command_line) = s.strip_prefix("stdio:") {
            let mut parts = command_line.split_whitespace().map(str::to_string);
            let command = parts.next().ok_or_else(|| {
                Error::Config("stdio endpoint needs a command, e.g. stdio:my-mcp-server".to_string())
            })?;
            return Ok(ToolEndpoint::Stdio {
                command,
                args: parts.collect(),
            });
        }

        let url = Url::parse(s)
            .map_err(|e| Error::Config(format!("Invalid tool endpoint '{}': {}", s, e)))?;

        match url.scheme() {
            "http" | "https" => Ok(ToolEndpoint::Sse(url)),
            other => Err(Error::Config(format!(
                "Unsupported tool endpoint scheme '{}'. Use http(s):// or stdio:<command>",
                other
            ))),
        }
    }
}

impl fmt::Display for ToolEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolEndpoint::Sse(url) => write!(f, "{}", url),
            ToolEndpoint::Stdio { command, args } if args.is_empty() => {
                write!(f, "stdio:{}", command)
            }
            ToolEndpoint::Stdio { command, args } => {
                write!(f, "stdio:{} {}", command, args.join(" "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sse_endpoint() {
        let endpoint: ToolEndpoint = "http://localhost:8931/sse".parse().unwrap();
        match endpoint {
            ToolEndpoint::Sse(url) => assert_eq!(url.path(), "/sse"),
            other => panic!("expected SSE endpoint, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_stdio_endpoint() {
        let endpoint: ToolEndpoint = "stdio:npx @playwright/mcp --headless".parse().unwrap();
        assert_eq!(
            endpoint,
            ToolEndpoint::Stdio {
                command: "npx".to_string(),
                args: vec!["@playwright/mcp".to_string(), "--headless".to_string()],
            }
        );
        assert_eq!(endpoint.to_string(), "stdio:npx @playwright/mcp --headless");
    }

    #[test]
    fn test_reject_unknown_scheme() {
        assert!(matches!(
            "ftp://example.com/sse".parse::<ToolEndpoint>(),
            Err(Error::Config(_))
        ));
        assert!("stdio:".parse::<ToolEndpoint>().is_err());
    }
}
