//! Tool server configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;
use crate::mcp::ToolEndpoint;

/// Tool server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// SSE URL (`http://...`) or `stdio:<command line>`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Bound on each tool server round-trip
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        ToolsConfig {
            endpoint: default_endpoint(),
            timeout: default_timeout(),
        }
    }
}

impl ToolsConfig {
    /// Parse the configured endpoint
    pub fn tool_endpoint(&self) -> Result<ToolEndpoint> {
        self.endpoint.parse()
    }
}

fn default_endpoint() -> String {
    "http://localhost:8931/sse".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}
