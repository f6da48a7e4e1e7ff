//! MCP client.
//!
//! [`McpClient`] picks its transport from the server configuration: a
//! `url` means streamable HTTP, a `command` means a stdio child process.

use std::sync::Arc;
use std::time::Duration;

use inline_agent_observability::{mcp_request_span, record_error};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, info, warn};

use crate::mcp::config::{McpServerConfig, TransportKind, process_env};
use crate::mcp::error::{McpError, McpResult};
use crate::mcp::protocol::{
    CallToolParams, CallToolResult, Implementation, InitializeParams, InitializeResult,
    ListToolsResult, Tool,
};
use crate::mcp::transport::{HttpTransport, StdioTransport, Transport};

/// Client shared between the tools of one server
pub type SharedMcpClient = Arc<Mutex<McpClient>>;

const CLIENT_NAME: &str = "inline-agent";

/// Connection to one MCP server.
///
/// ```ignore
/// use inline_agent_toolbus::mcp::{McpClient, McpServerConfig};
///
/// let config = McpServerConfig::new("time", "uvx").with_args(["mcp-server-time"]);
/// let mut client = McpClient::start(&config).await?;
/// for tool in client.list_tools().await? {
///     println!("{}: {}", tool.name, tool.description);
/// }
/// client.shutdown().await?;
/// ```
pub struct McpClient {
    transport: Transport,
    server_id: String,
    timeout: Duration,
    next_id: u64,
    server_info: Option<InitializeResult>,
    closed: bool,
}

impl McpClient {
    /// Open the transport. References in the config are resolved against
    /// the process environment.
    pub async fn connect(config: &McpServerConfig) -> McpResult<Self> {
        Self::connect_with(config, process_env).await
    }

    /// Like [`McpClient::connect`] with an explicit variable lookup.
    pub async fn connect_with<F>(config: &McpServerConfig, lookup: F) -> McpResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        config.validate()?;
        info!("Connecting to MCP server: {} ({})", config.display_name(), config.id);

        let transport = match &config.url {
            Some(url) => {
                let headers: Vec<(String, String)> =
                    config.auth_header(&lookup)?.into_iter().collect();
                Transport::Http(HttpTransport::new(url, &headers, &config.id)?)
            }
            None => {
                let env = config.resolved_env(&lookup)?;
                Transport::Stdio(StdioTransport::spawn(
                    &config.command,
                    &config.args,
                    &env,
                    config.working_dir.as_deref(),
                    &config.id,
                )?)
            }
        };

        Ok(Self {
            transport,
            server_id: config.id.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            next_id: 1,
            server_info: None,
            closed: false,
        })
    }

    /// Connect and run the initialize handshake.
    pub async fn start(config: &McpServerConfig) -> McpResult<Self> {
        let mut client = Self::connect(config).await?;
        client.initialize().await?;
        Ok(client)
    }

    pub fn into_shared(self) -> SharedMcpClient {
        Arc::new(Mutex::new(self))
    }

    async fn request<T: DeserializeOwned>(
        &mut self,
        method: &str,
        params: Option<JsonValue>,
    ) -> McpResult<T> {
        if self.closed {
            return Err(McpError::NotInitialized(self.server_id.clone()));
        }
        let id = self.next_id;
        self.next_id += 1;

        let span = mcp_request_span!(self.server_id.as_str(), method);
        let timeout = self.timeout;
        let outcome = tokio::time::timeout(
            timeout,
            self.transport.request(id, method, params).instrument(span.clone()),
        )
        .await;

        let result = match outcome {
            Ok(Ok(raw)) => serde_json::from_value(raw).map_err(McpError::from),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(McpError::Timeout {
                method: method.to_string(),
                secs: timeout.as_secs(),
            }),
        };
        if let Err(error) = &result {
            span.in_scope(|| record_error(error));
        }
        result
    }

    fn ensure_initialized(&self) -> McpResult<()> {
        if self.server_info.is_none() || self.closed {
            return Err(McpError::NotInitialized(self.server_id.clone()));
        }
        Ok(())
    }

    /// Handshake: `initialize` followed by `notifications/initialized`.
    pub async fn initialize(&mut self) -> McpResult<InitializeResult> {
        let params = InitializeParams::new(Implementation::new(
            CLIENT_NAME,
            env!("CARGO_PKG_VERSION"),
        ));
        let result: InitializeResult = self
            .request("initialize", Some(serde_json::to_value(params)?))
            .await?;

        info!(
            "[MCP:{}] Initialized: {} v{} (protocol {})",
            self.server_id,
            result.server_info.name,
            result.server_info.version,
            result.protocol_version
        );

        self.transport
            .notify("notifications/initialized", None)
            .await?;
        self.server_info = Some(result.clone());
        Ok(result)
    }

    /// All tools, following `nextCursor` pagination.
    pub async fn list_tools(&mut self) -> McpResult<Vec<Tool>> {
        self.ensure_initialized()?;

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor
                .take()
                .map(|c| serde_json::json!({ "cursor": c }));
            let page: ListToolsResult = self.request("tools/list", params).await?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        debug!("[MCP:{}] Found {} tools", self.server_id, tools.len());
        Ok(tools)
    }

    /// Call a tool. A result flagged `isError` is returned, not raised.
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: JsonValue,
    ) -> McpResult<CallToolResult> {
        self.ensure_initialized()?;

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        let result: CallToolResult = self
            .request("tools/call", Some(serde_json::to_value(params)?))
            .await?;

        if result.is_error {
            warn!(
                "[MCP:{}] Tool '{}' returned error: {}",
                self.server_id,
                name,
                result.text()
            );
        }
        Ok(result)
    }

    /// Close the transport. Safe to call more than once.
    pub async fn shutdown(&mut self) -> McpResult<()> {
        if self.closed {
            return Ok(());
        }
        info!("[MCP:{}] Shutting down", self.server_id);
        self.closed = true;
        self.transport.close().await
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn server_info(&self) -> Option<&InitializeResult> {
        self.server_info.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.server_info.is_some() && !self.closed
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_rejects_invalid_config() {
        let config = McpServerConfig::new("empty", "");
        let err = McpClient::connect(&config).await.err().unwrap();
        assert!(matches!(err, McpError::Config(_)));
    }

    #[tokio::test]
    async fn test_connect_requires_auth_variable() {
        let config = McpServerConfig::remote("remote", "http://127.0.0.1:9/mcp")
            .with_auth(crate::mcp::McpAuthConfig::bearer("$NOT_SET_ANYWHERE"));
        let err = McpClient::connect_with(&config, |_| None).await.err().unwrap();
        assert!(err.to_string().contains("NOT_SET_ANYWHERE"));
    }

    #[tokio::test]
    async fn test_calls_before_initialize_fail() {
        let config = McpServerConfig::remote("remote", "http://127.0.0.1:9/mcp");
        let mut client = McpClient::connect_with(&config, |_| None).await.unwrap();
        assert_eq!(client.transport_kind(), TransportKind::Http);
        assert!(!client.is_initialized());
        assert!(matches!(
            client.list_tools().await,
            Err(McpError::NotInitialized(_))
        ));
        client.shutdown().await.unwrap();
        client.shutdown().await.unwrap();
    }
}
