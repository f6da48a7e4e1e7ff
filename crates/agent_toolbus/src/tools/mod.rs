pub mod function;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::mcp::McpError;

pub use function::FunctionTool;

pub type ToolResult = anyhow::Result<JsonValue>;

/// A callable function an agent can request through return control.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema object describing the arguments
    fn parameters_schema(&self) -> JsonValue;
    async fn execute(&self, args: JsonValue) -> ToolResult;
}

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Function not found in action group '{group}': {function}")]
    NotFound { group: String, function: String },

    #[error("Duplicate function '{function}' in action group '{group}'")]
    Duplicate { group: String, function: String },

    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("Action group '{0}' is a builtin and has no local functions")]
    Builtin(String),

    #[error("Tool '{function}' failed: {source}")]
    Execution {
        function: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Mcp(#[from] McpError),
}

#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: JsonValue,
}

impl ToolInfo {
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters_schema(),
        }
    }
}
