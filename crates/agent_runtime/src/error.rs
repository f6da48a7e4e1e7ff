//! Runtime error types

use inline_agent_core::AgentError;
use inline_agent_observability::{ConfigError, ErrorType};
use inline_agent_toolbus::ToolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Agent did not finish within {0} return-control rounds")]
    TooManyRounds(u32),

    #[error("Tool setup failed: {0}")]
    Tool(#[from] ToolError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Agent backend unavailable: {0}")]
    Unavailable(String),
}

impl ErrorType for RuntimeError {
    /// Agent failures report the agent error's own variant.
    fn error_type(&self) -> String {
        match self {
            RuntimeError::Agent(e) => e.kind().to_string(),
            RuntimeError::TooManyRounds(_) => "TooManyRounds".to_string(),
            RuntimeError::Tool(_) => "Tool".to_string(),
            RuntimeError::Config(_) => "Config".to_string(),
            RuntimeError::Unavailable(_) => "Unavailable".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
