//! Functions an inline agent can call back into.
//!
//! Local [`Tool`]s and MCP server tools are grouped into [`ActionGroup`]s;
//! the runtime hands the group descriptors to the agent and dispatches the
//! function invocations the agent returns.

pub mod action_group;
pub mod mcp;
pub mod tools;

pub use action_group::{ActionGroup, coerce_arguments, parameter_specs};
pub use mcp::{McpClient, McpError, McpServerConfig, McpServersConfig, McpTool, SharedMcpClient};
pub use tools::{FunctionTool, Tool, ToolError, ToolInfo, ToolResult};
