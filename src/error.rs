//! Error types for Wayfarer

use thiserror::Error;

/// Main error type for the agent library
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM request failed or returned an unusable response
    #[error("LLM error: {0}")]
    Llm(String),

    /// Tool execution failed
    #[error("Tool error: {0}")]
    Tool(String),

    /// Requested tool is not registered
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Summarization call failed; the message buffer is left untouched
    #[error("Summarization failed: {0}")]
    Summarization(String),

    /// Response or payload did not match the expected shape
    #[error("Invalid response format: {0}")]
    InvalidFormat(String),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AgentError>;
