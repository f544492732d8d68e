//! # toolchat
//!
//! A single-tool-call chat client: one user utterance goes to a language
//! model together with the tools an MCP server offers, the model may ask for
//! one of them, the tool runs once, and the model writes the final answer.
//!
//! ## Features
//!
//! - **MCP tool sessions:** HTTP + SSE or stdio transports, scoped per turn
//! - **Two function-calling dialects:** OpenAI-compatible `tool_calls` and
//!   Gemini content parts, with schema translation between them
//! - **Bounded and fail-fast:** every network call has a timeout, nothing is
//!   retried, the tool session is always released
//! - **CLI and HTTP gateway** around the same orchestrator
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use toolchat::{build_client, ChatOrchestrator, Config, McpSessionFactory};
//!
//! # async fn example() -> toolchat::Result<()> {
//! let config = Config::from_env()?;
//! let orchestrator = ChatOrchestrator::new(
//!     build_client(&config.model)?,
//!     Arc::new(McpSessionFactory::new(config.tools.timeout)),
//!     config.tools.tool_endpoint()?,
//! );
//!
//! let answer = orchestrator.handle("What is 2+2?").await?;
//! println!("{}", answer);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod mcp;
pub mod model;
pub mod orchestrator;
pub mod schema;

pub use config::Config;
pub use error::{Error, Result};
pub use mcp::{McpSessionFactory, ToolEndpoint, ToolSession};
pub use model::{build_client, ModelClient, ModelResponse};
pub use orchestrator::{ChatOrchestrator, TurnTrace};
pub use schema::SchemaDialect;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
