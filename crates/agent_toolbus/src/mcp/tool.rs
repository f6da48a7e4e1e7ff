//! Exposes MCP tools through the [`Tool`](crate::Tool) trait.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::mcp::client::SharedMcpClient;
use crate::mcp::protocol::Tool as McpToolDefinition;
use crate::tools::{Tool, ToolResult};

/// One tool of a connected MCP server.
///
/// The tool keeps the server's own name; action groups reject duplicates,
/// so two servers exporting the same name belong in different groups.
pub struct McpTool {
    server_id: String,
    definition: McpToolDefinition,
    client: SharedMcpClient,
}

impl McpTool {
    pub fn new(
        server_id: impl Into<String>,
        definition: McpToolDefinition,
        client: SharedMcpClient,
    ) -> Self {
        Self {
            server_id: server_id.into(),
            definition,
            client,
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn definition(&self) -> &McpToolDefinition {
        &self.definition
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn description(&self) -> &str {
        &self.definition.description
    }

    fn parameters_schema(&self) -> JsonValue {
        self.definition.input_schema.clone()
    }

    async fn execute(&self, args: JsonValue) -> ToolResult {
        let result = self
            .client
            .lock()
            .await
            .call_tool(&self.definition.name, args)
            .await
            .map_err(|e| anyhow::anyhow!("MCP server '{}': {}", self.server_id, e))?;

        if result.is_error {
            anyhow::bail!("{}", result.text());
        }

        Ok(match result.structured_content {
            Some(structured) => structured,
            None => JsonValue::String(result.text()),
        })
    }
}
