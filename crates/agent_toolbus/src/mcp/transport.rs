//! MCP transports.
//!
//! - **Stdio**: newline-delimited JSON-RPC over a spawned child process
//! - **Http**: streamable HTTP; each message is a POST whose response is
//!   either a JSON body or a short SSE stream carrying the reply
//!
//! [`Transport`] wraps both so the client never deals with trait objects.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as HttpClient, StatusCode};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::mcp::config::TransportKind;
use crate::mcp::error::{McpError, McpResult};
use crate::mcp::protocol::{JsonRpcError, JsonRpcMessage, JsonRpcRequest};

/// Session header assigned by streamable HTTP servers
pub const SESSION_HEADER: &str = "mcp-session-id";

const STDIO_EXIT_GRACE: Duration = Duration::from_secs(2);

pub enum Transport {
    Stdio(StdioTransport),
    Http(HttpTransport),
}

impl Transport {
    /// Send request `id` and wait for its result.
    pub async fn request(
        &mut self,
        id: u64,
        method: &str,
        params: Option<JsonValue>,
    ) -> McpResult<JsonValue> {
        let request = JsonRpcRequest::new(id, method, params);
        match self {
            Transport::Stdio(t) => t.request(&request).await,
            Transport::Http(t) => t.request(&request).await,
        }
    }

    pub async fn notify(&mut self, method: &str, params: Option<JsonValue>) -> McpResult<()> {
        let notification = JsonRpcRequest::notification(method, params);
        match self {
            Transport::Stdio(t) => t.write_message(&notification).await,
            Transport::Http(t) => t.notify(&notification).await,
        }
    }

    pub async fn close(&mut self) -> McpResult<()> {
        match self {
            Transport::Stdio(t) => t.close().await,
            Transport::Http(t) => t.close().await,
        }
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            Transport::Stdio(_) => TransportKind::Stdio,
            Transport::Http(_) => TransportKind::Http,
        }
    }
}

fn rpc_error(error: JsonRpcError) -> McpError {
    McpError::JsonRpc {
        code: error.code,
        message: error.message,
    }
}

/// Local MCP server process speaking JSON-RPC on stdin/stdout.
pub struct StdioTransport {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    server_id: String,
}

impl StdioTransport {
    pub fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        working_dir: Option<&Path>,
        server_id: &str,
    ) -> McpResult<Self> {
        info!("Starting MCP server process: {} {:?}", command, args);

        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| McpError::StartFailed(format!("Failed to start '{}': {}", command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::StartFailed("Could not capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::StartFailed("Could not capture stdout".to_string()))?;

        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
            server_id: server_id.to_string(),
        })
    }

    async fn write_message<T: Serialize>(&mut self, message: &T) -> McpResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| McpError::Protocol("stdin already closed".to_string()))?;
        let mut line = serde_json::to_string(message)?;
        debug!("[MCP:{}] Sending: {}", self.server_id, line);
        line.push('\n');
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn request(&mut self, request: &JsonRpcRequest) -> McpResult<JsonValue> {
        let id = request.id.unwrap_or_default();
        self.write_message(request).await?;

        loop {
            let line = self.stdout.next_line().await?.ok_or_else(|| {
                McpError::Protocol(format!("server closed stdout before answering request {id}"))
            })?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let message: JsonRpcMessage = match serde_json::from_str(line) {
                Ok(message) => message,
                Err(_) => {
                    debug!("[MCP:{}] Ignoring non JSON-RPC output: {}", self.server_id, line);
                    continue;
                }
            };

            if message.answers(id) {
                debug!("[MCP:{}] Received: {}", self.server_id, line);
                return message.into_result().map_err(rpc_error);
            }

            // Servers may ping us while we wait
            if let (Some("ping"), Some(ping_id)) = (message.method.as_deref(), message.id.clone()) {
                let pong = serde_json::json!({"jsonrpc": "2.0", "id": ping_id, "result": {}});
                self.write_message(&pong).await?;
                continue;
            }

            debug!(
                "[MCP:{}] Skipping message while waiting for {}: {}",
                self.server_id, id, line
            );
        }
    }

    /// Close stdin and give the process a moment to exit before killing it.
    async fn close(&mut self) -> McpResult<()> {
        drop(self.stdin.take());
        match tokio::time::timeout(STDIO_EXIT_GRACE, self.child.wait()).await {
            Ok(status) => {
                debug!("[MCP:{}] Process exited: {:?}", self.server_id, status?);
            }
            Err(_) => {
                self.child.kill().await?;
                debug!("[MCP:{}] Process killed", self.server_id);
            }
        }
        Ok(())
    }
}

/// Remote MCP server reached over streamable HTTP.
pub struct HttpTransport {
    http_client: HttpClient,
    url: String,
    headers: HeaderMap,
    session_id: Option<String>,
    server_id: String,
}

impl HttpTransport {
    pub fn new(url: &str, headers: &[(String, String)], server_id: &str) -> McpResult<Self> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| McpError::AuthFailed(format!("Invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| McpError::AuthFailed(format!("Invalid header value: {}", e)))?;
            header_map.insert(name, value);
        }

        Ok(Self {
            http_client: HttpClient::new(),
            url: url.to_string(),
            headers: header_map,
            session_id: None,
            server_id: server_id.to_string(),
        })
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    async fn post(&mut self, message: &JsonRpcRequest) -> McpResult<reqwest::Response> {
        debug!("[MCP:{}] HTTP POST {} {}", self.server_id, self.url, message.method);

        let mut builder = self
            .http_client
            .post(&self.url)
            .headers(self.headers.clone())
            .header(ACCEPT, "application/json, text/event-stream")
            .json(message);
        if let Some(session) = &self.session_id {
            builder = builder.header(SESSION_HEADER, session);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| McpError::Http(format!("request failed: {}", e)))?;

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            self.session_id = Some(session.to_string());
        }

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(McpError::AuthFailed(format!("server returned {}", status)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Http(format!("HTTP {}: {}", status, body)));
        }
        Ok(response)
    }

    async fn request(&mut self, request: &JsonRpcRequest) -> McpResult<JsonValue> {
        let id = request.id.unwrap_or_default();
        let response = self.post(request).await?;

        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));
        let body = response
            .text()
            .await
            .map_err(|e| McpError::Http(format!("failed to read response: {}", e)))?;
        debug!("[MCP:{}] Response: {}", self.server_id, body);

        let message = if is_event_stream {
            find_sse_response(&body, id)?
        } else {
            find_json_response(&body, id)?
        };
        message.into_result().map_err(rpc_error)
    }

    async fn notify(&mut self, notification: &JsonRpcRequest) -> McpResult<()> {
        self.post(notification).await?;
        Ok(())
    }

    /// End the server-side session, if one was assigned.
    async fn close(&mut self) -> McpResult<()> {
        let Some(session) = self.session_id.take() else {
            return Ok(());
        };
        let result = self
            .http_client
            .delete(&self.url)
            .headers(self.headers.clone())
            .header(SESSION_HEADER, &session)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                debug!("[MCP:{}] Session {} closed", self.server_id, session);
            }
            Ok(response) => {
                // 405 means the server does not support explicit termination
                debug!(
                    "[MCP:{}] Session close returned {}",
                    self.server_id,
                    response.status()
                );
            }
            Err(e) => warn!("[MCP:{}] Failed to close session: {}", self.server_id, e),
        }
        Ok(())
    }
}

/// Pick the response to `id` out of a JSON body (single message or batch).
pub fn find_json_response(body: &str, id: u64) -> McpResult<JsonRpcMessage> {
    let value: JsonValue = serde_json::from_str(body)
        .map_err(|e| McpError::Protocol(format!("Invalid JSON response: {}", e)))?;
    let candidates = match value {
        JsonValue::Array(items) => items,
        single => vec![single],
    };
    candidates
        .into_iter()
        .filter_map(|v| serde_json::from_value::<JsonRpcMessage>(v).ok())
        .find(|m| m.answers(id))
        .ok_or_else(|| McpError::Protocol(format!("no response to request {id} in body")))
}

/// Pick the response to `id` out of an SSE body.
///
/// Events are separated by blank lines; multiple `data:` lines in one event
/// are joined with newlines.
pub fn find_sse_response(body: &str, id: u64) -> McpResult<JsonRpcMessage> {
    let normalized = body.replace("\r\n", "\n");
    for event in normalized.split("\n\n") {
        let data = event
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|d| d.strip_prefix(' ').unwrap_or(d))
            .collect::<Vec<_>>()
            .join("\n");
        if data.is_empty() {
            continue;
        }
        if let Ok(message) = serde_json::from_str::<JsonRpcMessage>(&data) {
            if message.answers(id) {
                return Ok(message);
            }
        }
    }
    Err(McpError::Protocol(format!(
        "no response to request {id} in event stream"
    )))
}
