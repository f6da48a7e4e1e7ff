use thiserror::Error;

use crate::mcp::config::McpConfigError;

/// MCP client errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Failed to start MCP server: {0}")]
    StartFailed(String),

    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc { code: i64, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("HTTP transport error: {0}")]
    Http(String),

    #[error("MCP request '{method}' timed out after {secs}s")]
    Timeout { method: String, secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("MCP server not initialized: {0}")]
    NotInitialized(String),

    #[error("Configuration error: {0}")]
    Config(#[from] McpConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for MCP operations
pub type McpResult<T> = Result<T, McpError>;
