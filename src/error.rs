//! Error types for toolchat
//!
//! Every failure is fatal to the chat turn that produced it. Nothing in the
//! crate retries; the orchestrator closes the tool session and surfaces the
//! error to its caller.

use thiserror::Error;

/// Result type alias using toolchat's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for toolchat
#[derive(Error, Debug)]
pub enum Error {
    /// Tool endpoint unreachable, transport broken or handshake failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Operation attempted on a session in the wrong state
    #[error("Session state error: {0}")]
    SessionState(String),

    /// The model requested a tool the session never enumerated
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool arguments were malformed or rejected by the input schema
    #[error("Invalid tool arguments: {0}")]
    ToolArgument(String),

    /// The tool endpoint reported a failure while executing the tool
    #[error("Tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// Completion request failed or the response could not be understood
    #[error("Model endpoint error: {0}")]
    ModelEndpoint(String),

    /// A bounded network call expired
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if error is a client error (bad input or setup rather than a remote failure)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::ToolArgument(_) | Error::ToolNotFound(_) | Error::Config(_)
        )
    }

    /// HTTP status used when the error is reported by the gateway
    pub fn status_code(&self) -> u16 {
        match self {
            Error::ToolArgument(_) | Error::ToolNotFound(_) => 422,
            Error::Config(_) | Error::SessionState(_) => 500,
            Error::Timeout(_) => 504,
            Error::Connection(_)
            | Error::ToolExecution { .. }
            | Error::ModelEndpoint(_)
            | Error::Http(_) => 502,
            Error::Json(_) | Error::Io(_) => 500,
        }
    }
}
