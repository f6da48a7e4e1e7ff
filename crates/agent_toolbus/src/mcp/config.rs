//! MCP server configuration.
//!
//! Servers are listed in a TOML file. Auth tokens and environment values
//! may reference environment variables as `$NAME` or `${NAME}`; references
//! are resolved when a client connects, never when the file is loaded, so
//! saving a loaded file keeps the references intact.
//!
//! ```toml
//! # Local server over stdio
//! [[servers]]
//! id = "time"
//! command = "uvx"
//! args = ["mcp-server-time"]
//! env = { TZ = "UTC" }
//!
//! # Remote server over streamable HTTP
//! [[servers]]
//! id = "search"
//! url = "https://mcp.example.com/mcp"
//!
//! [servers.auth]
//! auth_type = "bearer"
//! token = "$SEARCH_API_TOKEN"
//! ```

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default per-request timeout for MCP calls
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Error, Debug)]
pub enum McpConfigError {
    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize configuration to TOML: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid variable reference: {0}")]
    Interpolation(String),

    #[error("Invalid server '{id}': {reason}")]
    InvalidServer { id: String, reason: String },

    #[error("Duplicate server id: {0}")]
    DuplicateServer(String),
}

/// Expand `$NAME` and `${NAME}` references using `lookup`.
///
/// A `$` not followed by a name is kept literally. Any referenced variable
/// that `lookup` cannot resolve is an error.
pub fn interpolate<F>(value: &str, lookup: F) -> Result<String, McpConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = match after.strip_prefix('{') {
            Some(braced) => match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => {
                    return Err(McpConfigError::Interpolation(format!(
                        "unterminated '${{' in '{value}'"
                    )));
                }
            },
            None => {
                let end = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                (&after[..end], end)
            }
        };

        if name.is_empty() {
            out.push('$');
            rest = after;
            continue;
        }

        let resolved =
            lookup(name).ok_or_else(|| McpConfigError::EnvVarNotFound(name.to_string()))?;
        out.push_str(&resolved);
        rest = &after[consumed..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Process environment lookup used outside tests
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Authentication for remote servers.
///
/// `auth_type` is one of `bearer`, `basic` or `api_key`; anything else sends
/// the resolved token verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpAuthConfig {
    pub auth_type: String,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
}

impl McpAuthConfig {
    pub fn new(auth_type: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            auth_type: auth_type.into(),
            token: token.into(),
            header: None,
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self::new("bearer", token)
    }

    pub fn api_key(key: impl Into<String>) -> Self {
        Self::new("api_key", key)
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    pub fn header_name(&self) -> &str {
        self.header
            .as_deref()
            .unwrap_or(match self.auth_type.as_str() {
                "api_key" => "X-API-Key",
                _ => "Authorization",
            })
    }

    pub fn header_value<F>(&self, lookup: F) -> Result<String, McpConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = interpolate(&self.token, lookup)?;
        Ok(match self.auth_type.as_str() {
            "bearer" => format!("Bearer {token}"),
            "basic" => format!("Basic {token}"),
            _ => token,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Stdio,
    Http,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Stdio => write!(f, "stdio"),
            TransportKind::Http => write!(f, "http"),
        }
    }
}

/// One MCP server: either a local `command` or a remote `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<McpAuthConfig>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl McpServerConfig {
    /// Local server started as `command`
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            command: command.into(),
            url: None,
            args: Vec::new(),
            env: HashMap::new(),
            working_dir: None,
            auth: None,
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }

    /// Remote server reached at `url`
    pub fn remote(id: impl Into<String>, url: impl Into<String>) -> Self {
        let mut config = Self::new(id, "");
        config.url = Some(url.into());
        config
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_auth(mut self, auth: McpAuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    pub fn is_remote(&self) -> bool {
        self.url.is_some()
    }

    pub fn is_local(&self) -> bool {
        !self.command.is_empty() && self.url.is_none()
    }

    pub fn transport_kind(&self) -> TransportKind {
        if self.is_remote() {
            TransportKind::Http
        } else {
            TransportKind::Stdio
        }
    }

    pub fn validate(&self) -> Result<(), McpConfigError> {
        let invalid = |reason: &str| McpConfigError::InvalidServer {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.id.trim().is_empty() {
            return Err(invalid("id must not be empty"));
        }
        match (&self.url, self.command.is_empty()) {
            (Some(_), false) => Err(invalid("set either 'command' or 'url', not both")),
            (None, true) => Err(invalid("either 'command' or 'url' must be set")),
            (Some(url), true) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                Err(invalid("'url' must start with http:// or https://"))
            }
            _ if self.timeout_secs == 0 => Err(invalid("'timeout_secs' must be positive")),
            _ => Ok(()),
        }
    }

    /// Child process environment with references expanded.
    pub fn resolved_env<F>(&self, lookup: F) -> Result<HashMap<String, String>, McpConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.env
            .iter()
            .map(|(key, value)| Ok((key.clone(), interpolate(value, &lookup)?)))
            .collect()
    }

    /// Auth header as `(name, value)`, if auth is configured.
    pub fn auth_header<F>(&self, lookup: F) -> Result<Option<(String, String)>, McpConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match &self.auth {
            Some(auth) => Ok(Some((
                auth.header_name().to_string(),
                auth.header_value(lookup)?,
            ))),
            None => Ok(None),
        }
    }
}

/// Root of an MCP servers TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct McpServersConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<McpServerConfig>,
}

impl McpServersConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(content: &str) -> Result<Self, McpConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, McpConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Write as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), McpConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), McpConfigError> {
        let mut seen = std::collections::HashSet::new();
        for server in &self.servers {
            server.validate()?;
            if !seen.insert(server.id.as_str()) {
                return Err(McpConfigError::DuplicateServer(server.id.clone()));
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&McpServerConfig> {
        self.servers.iter().find(|s| s.id == id)
    }

    pub fn add(&mut self, server: McpServerConfig) -> Result<(), McpConfigError> {
        server.validate()?;
        if self.get(&server.id).is_some() {
            return Err(McpConfigError::DuplicateServer(server.id));
        }
        self.servers.push(server);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<McpServerConfig> {
        let index = self.servers.iter().position(|s| s.id == id)?;
        Some(self.servers.remove(index))
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}
