//! Model Context Protocol client support.
//!
//! MCP servers contribute their tools to action groups at runtime.
//!
//! - **protocol**: JSON-RPC envelopes and MCP messages
//! - **transport**: stdio and streamable HTTP transports
//! - **config**: server configuration and TOML persistence
//! - **client**: handshake, tool listing and tool calls
//! - **tool**: adapter from an MCP tool to [`Tool`](crate::Tool)
//! - **error**: error types for MCP operations

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod tool;
pub mod transport;

pub use client::{McpClient, SharedMcpClient};
pub use config::{
    McpAuthConfig, McpConfigError, McpServerConfig, McpServersConfig, TransportKind, interpolate,
};
pub use error::{McpError, McpResult};
pub use protocol::{CallToolResult, Content, InitializeResult, Tool as McpToolDefinition};
pub use tool::McpTool;
pub use transport::{HttpTransport, StdioTransport, Transport};
