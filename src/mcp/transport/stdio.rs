//! Stdio transport for MCP
//!
//! Spawns the server as a subprocess and exchanges newline-delimited JSON
//! over its stdin/stdout. The child is killed when the transport closes or
//! is dropped.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::debug;

use super::Transport;
use crate::error::{Error, Result};
use crate::mcp::protocol::{McpNotification, McpRequest, McpResponse};

/// Stdio transport for local MCP servers
pub struct StdioTransport {
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<BufReader<ChildStdout>>,
    name: String,
}

impl StdioTransport {
    /// Spawn the server process
    pub fn spawn(command: &str, args: &[String]) -> Result<Self> {
        debug!("Spawning MCP server: {} {:?}", command, args);

        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Connection(format!("Failed to spawn MCP server '{}': {}", command, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Connection("Failed to capture MCP server stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Connection("Failed to capture MCP server stdout".to_string()))?;

        Ok(StdioTransport {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
            name: command.to_string(),
        })
    }

    async fn write_line<T: serde::Serialize>(&self, message: &T) -> Result<()> {
        let json = serde_json::to_string(message)?;
        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(json.as_bytes())
            .await
            .map_err(|e| Error::Connection(format!("Failed to write to MCP server: {}", e)))?;
        stdin
            .write_all(b"\n")
            .await
            .map_err(|e| Error::Connection(format!("Failed to write to MCP server: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| Error::Connection(format!("Failed to flush MCP server stdin: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn request(&self, request: McpRequest) -> Result<McpResponse> {
        self.write_line(&request).await?;

        let mut stdout = self.stdout.lock().await;
        loop {
            let mut line = String::new();
            let read = stdout
                .read_line(&mut line)
                .await
                .map_err(|e| Error::Connection(format!("Failed to read from MCP server: {}", e)))?;

            if read == 0 {
                return Err(Error::Connection(format!(
                    "MCP server '{}' closed its stdout",
                    self.name
                )));
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<McpResponse>(line) {
                Ok(response) if response.method.is_none() && response.id == Some(request.id) => {
                    return Ok(response)
                }
                Ok(_) => debug!("Skipping unrelated MCP message from {}: {}", self.name, line),
                Err(e) => debug!("Skipping non-JSON output from {}: {} ({})", self.name, line, e),
            }
        }
    }

    async fn notify(&self, notification: McpNotification) -> Result<()> {
        self.write_line(&notification).await
    }

    async fn close(&self) -> Result<()> {
        let mut child = self.child.lock().await;
        if child.try_wait()?.is_none() {
            debug!("Stopping MCP server {}", self.name);
            child.kill().await?;
        }
        Ok(())
    }
}
