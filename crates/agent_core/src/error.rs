use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("invocation failed: {0}")]
    Invocation(String),

    #[error("invocation timed out after {0}ms")]
    Timeout(u64),

    #[error("response stream error: {0}")]
    Stream(String),

    #[error("tool error: {0}")]
    Tool(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AgentError {
    /// Stable name of the failure class, used as the `error.type` of telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Invocation(_) => "Invocation",
            AgentError::Timeout(_) => "Timeout",
            AgentError::Stream(_) => "Stream",
            AgentError::Tool(_) => "Tool",
            AgentError::Config(_) => "Config",
            AgentError::Io(_) => "Io",
            AgentError::Json(_) => "Json",
            AgentError::Other(_) => "Other",
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
