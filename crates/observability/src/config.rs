//! Configuration for observability/telemetry

use std::path::PathBuf;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default directory for saved trace captures
pub const DEFAULT_TRACE_DIR: &str = "traces";

/// OTLP transport used by every exporter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtlpProtocol {
    Grpc,
    #[default]
    HttpProtobuf,
    HttpJson,
}

impl OtlpProtocol {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "grpc" => Some(OtlpProtocol::Grpc),
            "http/protobuf" | "http" => Some(OtlpProtocol::HttpProtobuf),
            "http/json" => Some(OtlpProtocol::HttpJson),
            _ => None,
        }
    }

    pub fn is_http(&self) -> bool {
        !matches!(self, OtlpProtocol::Grpc)
    }
}

/// How finished spans reach the exporter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanProcessorKind {
    /// Export each span synchronously when it ends
    Simple,
    #[default]
    Batch,
}

/// Observability configuration
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Service name for traces (e.g., "bedrock-agent")
    pub service_name: String,

    /// Service version
    pub service_version: Option<String>,

    /// OTLP collector base URL (e.g., "https://otlp.nr-data.net")
    pub otlp_endpoint: String,

    #[serde(default)]
    pub protocol: OtlpProtocol,

    /// Headers sent with every export request (auth tokens live here)
    #[serde(default)]
    pub headers: Vec<(String, String)>,

    #[serde(default)]
    pub span_processor: SpanProcessorKind,

    #[serde(default)]
    pub enable_metrics: bool,

    #[serde(default)]
    pub enable_logs: bool,

    /// Enable console/log output in addition to OTLP export
    #[serde(default = "default_true")]
    pub enable_console: bool,

    /// Log level filter (e.g., "info", "debug", "trace")
    /// Defaults to "info" if not set
    pub log_level: Option<String>,

    /// Additional resource attributes (key-value pairs)
    #[serde(default)]
    pub resource_attributes: Vec<(String, String)>,

    /// Print each trace capture after the invocation ends
    #[serde(default)]
    pub show_traces: bool,

    /// Persist each trace capture under `trace_dir`
    #[serde(default)]
    pub save_traces: bool,

    #[serde(default = "default_trace_dir")]
    pub trace_dir: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_trace_dir() -> PathBuf {
    PathBuf::from(DEFAULT_TRACE_DIR)
}

// Header values carry credentials, keep them out of debug output.
impl std::fmt::Debug for ObservabilityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(k, _)| (k.as_str(), "<redacted>"))
            .collect();
        f.debug_struct("ObservabilityConfig")
            .field("service_name", &self.service_name)
            .field("service_version", &self.service_version)
            .field("otlp_endpoint", &self.otlp_endpoint)
            .field("protocol", &self.protocol)
            .field("headers", &headers)
            .field("span_processor", &self.span_processor)
            .field("enable_metrics", &self.enable_metrics)
            .field("enable_logs", &self.enable_logs)
            .field("enable_console", &self.enable_console)
            .field("log_level", &self.log_level)
            .field("resource_attributes", &self.resource_attributes)
            .field("show_traces", &self.show_traces)
            .field("save_traces", &self.save_traces)
            .field("trace_dir", &self.trace_dir)
            .finish()
    }
}

impl ObservabilityConfig {
    /// Create a new configuration with service name and collector endpoint
    pub fn new(service_name: impl Into<String>, otlp_endpoint: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_version: None,
            otlp_endpoint: otlp_endpoint.into().trim_end_matches('/').to_string(),
            protocol: OtlpProtocol::default(),
            headers: Vec::new(),
            span_processor: SpanProcessorKind::default(),
            enable_metrics: false,
            enable_logs: false,
            enable_console: true,
            log_level: None,
            resource_attributes: Vec::new(),
            show_traces: false,
            save_traces: false,
            trace_dir: default_trace_dir(),
        }
    }

    /// Set service version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = Some(version.into());
        self
    }

    pub fn with_protocol(mut self, protocol: OtlpProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Add an export header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_span_processor(mut self, kind: SpanProcessorKind) -> Self {
        self.span_processor = kind;
        self
    }

    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    pub fn with_logs(mut self, enable: bool) -> Self {
        self.enable_logs = enable;
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enable: bool) -> Self {
        self.enable_console = enable;
        self
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    /// Add resource attribute
    pub fn with_resource_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.resource_attributes.push((key.into(), value.into()));
        self
    }

    pub fn with_show_traces(mut self, enable: bool) -> Self {
        self.show_traces = enable;
        self
    }

    pub fn with_save_traces(mut self, enable: bool) -> Self {
        self.save_traces = enable;
        self
    }

    pub fn with_trace_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.trace_dir = dir.into();
        self
    }

    /// Build from environment variables
    ///
    /// Reads:
    /// - `OTEL_SERVICE_NAME` or `SERVICE_NAME` → service_name (required)
    /// - `OTEL_EXPORTER_OTLP_ENDPOINT` → otlp_endpoint (required, http/https URL)
    /// - `OTEL_EXPORTER_OTLP_HEADERS` → headers (`k=v,...` or a bare API token)
    /// - `OTEL_SERVICE_VERSION` or `SERVICE_VERSION` → service_version
    /// - `OTEL_EXPORTER_OTLP_PROTOCOL` → protocol
    /// - `OTEL_TRACES_SPAN_PROCESSOR` → span_processor
    /// - `OTEL_METRICS_ENABLED`, `OTEL_LOGS_ENABLED` → enable_metrics, enable_logs
    /// - `OTEL_LOG_LEVEL` or `RUST_LOG` → log_level
    /// - `OTEL_RESOURCE_ATTRIBUTES` → resource_attributes
    /// - `OBSERVE_SHOW_TRACES`, `OBSERVE_SAVE_TRACES`, `OBSERVE_TRACE_DIR`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader::new(lookup);

        let service_name = env.required_any(&["OTEL_SERVICE_NAME", "SERVICE_NAME"])?;
        let endpoint = env.required("OTEL_EXPORTER_OTLP_ENDPOINT")?;
        let otlp_endpoint = validate_endpoint("OTEL_EXPORTER_OTLP_ENDPOINT", &endpoint)?;

        let headers = match env.optional("OTEL_EXPORTER_OTLP_HEADERS") {
            Some(raw) => parse_headers("OTEL_EXPORTER_OTLP_HEADERS", &raw)?,
            None => Vec::new(),
        };

        let protocol = match env.optional("OTEL_EXPORTER_OTLP_PROTOCOL") {
            Some(raw) => OtlpProtocol::parse(&raw).ok_or_else(|| {
                ConfigError::invalid(
                    "OTEL_EXPORTER_OTLP_PROTOCOL",
                    format!("expected grpc, http/protobuf or http/json, got '{raw}'"),
                )
            })?,
            None => OtlpProtocol::default(),
        };

        let span_processor = match env.optional("OTEL_TRACES_SPAN_PROCESSOR") {
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "simple" => SpanProcessorKind::Simple,
                "batch" => SpanProcessorKind::Batch,
                _ => {
                    return Err(ConfigError::invalid(
                        "OTEL_TRACES_SPAN_PROCESSOR",
                        format!("expected simple or batch, got '{raw}'"),
                    ))
                }
            },
            None => SpanProcessorKind::default(),
        };

        let resource_attributes = match env.optional("OTEL_RESOURCE_ATTRIBUTES") {
            Some(raw) => parse_key_values("OTEL_RESOURCE_ATTRIBUTES", &raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            service_name,
            service_version: env.optional_any(&["OTEL_SERVICE_VERSION", "SERVICE_VERSION"]),
            otlp_endpoint,
            protocol,
            headers,
            span_processor,
            enable_metrics: env.flag("OTEL_METRICS_ENABLED", false)?,
            enable_logs: env.flag("OTEL_LOGS_ENABLED", false)?,
            enable_console: true,
            log_level: env.optional_any(&["OTEL_LOG_LEVEL", "RUST_LOG"]),
            resource_attributes,
            show_traces: env.flag("OBSERVE_SHOW_TRACES", false)?,
            save_traces: env.flag("OBSERVE_SAVE_TRACES", false)?,
            trace_dir: env
                .optional("OBSERVE_TRACE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_trace_dir),
        })
    }
}

/// Typed reads over an environment-like lookup. Empty values count as absent.
pub struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    pub fn new(lookup: F) -> Self {
        Self { lookup }
    }

    pub fn optional(&self, var: &str) -> Option<String> {
        (self.lookup)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn optional_any(&self, vars: &[&str]) -> Option<String> {
        vars.iter().find_map(|var| self.optional(var))
    }

    pub fn required(&self, var: &str) -> Result<String, ConfigError> {
        self.optional(var)
            .ok_or_else(|| ConfigError::MissingVar(var.to_string()))
    }

    /// First present of `vars`; the error names the primary variable.
    pub fn required_any(&self, vars: &[&str]) -> Result<String, ConfigError> {
        self.optional_any(vars)
            .ok_or_else(|| ConfigError::MissingVar(vars.first().copied().unwrap_or_default().to_string()))
    }

    pub fn flag(&self, var: &str, default: bool) -> Result<bool, ConfigError> {
        match self.optional(var) {
            Some(raw) => parse_flag(var, &raw),
            None => Ok(default),
        }
    }
}

pub fn parse_flag(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(
            var,
            format!("expected a boolean flag, got '{raw}'"),
        )),
    }
}

fn validate_endpoint(var: &str, raw: &str) -> Result<String, ConfigError> {
    let url = url::Url::parse(raw).map_err(|e| ConfigError::invalid(var, e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::invalid(
            var,
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if url.host_str().is_none() {
        return Err(ConfigError::invalid(var, "missing host"));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

/// `k=v,k2=v2` with percent-decoded values, or a bare token which becomes
/// `Authorization: Api-Token <token>`.
fn parse_headers(var: &str, raw: &str) -> Result<Vec<(String, String)>, ConfigError> {
    if !raw.contains('=') {
        return Ok(vec![(
            "Authorization".to_string(),
            format!("Api-Token {raw}"),
        )]);
    }
    parse_key_values(var, raw)
}

fn parse_key_values(var: &str, raw: &str) -> Result<Vec<(String, String)>, ConfigError> {
    raw.split_terminator(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| ConfigError::invalid(var, format!("expected key=value, got '{pair}'")))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::invalid(var, "empty key"));
            }
            let value = percent_decode_str(value.trim())
                .decode_utf8()
                .map_err(|e| ConfigError::invalid(var, e.to_string()))?;
            Ok((key.to_string(), value.into_owned()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![
            ("OTEL_SERVICE_NAME", "bedrock-agent"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "https://otlp.nr-data.net/"),
        ]
    }

    #[test]
    fn test_minimal_config() {
        let config = ObservabilityConfig::from_lookup(lookup(&base())).unwrap();
        assert_eq!(config.service_name, "bedrock-agent");
        assert_eq!(config.otlp_endpoint, "https://otlp.nr-data.net");
        assert_eq!(config.protocol, OtlpProtocol::HttpProtobuf);
        assert_eq!(config.span_processor, SpanProcessorKind::Batch);
        assert!(config.headers.is_empty());
        assert!(!config.enable_metrics);
        assert_eq!(config.trace_dir, PathBuf::from("traces"));
    }

    #[test]
    fn test_missing_service_name() {
        let err = ObservabilityConfig::from_lookup(lookup(&[(
            "OTEL_EXPORTER_OTLP_ENDPOINT",
            "http://localhost:4318",
        )]))
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingVar("OTEL_SERVICE_NAME".to_string()));
    }

    #[test]
    fn test_service_name_alias() {
        let config = ObservabilityConfig::from_lookup(lookup(&[
            ("SERVICE_NAME", "svc"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4318"),
        ]))
        .unwrap();
        assert_eq!(config.service_name, "svc");
    }

    #[test]
    fn test_missing_endpoint() {
        let err =
            ObservabilityConfig::from_lookup(lookup(&[("OTEL_SERVICE_NAME", "svc")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingVar("OTEL_EXPORTER_OTLP_ENDPOINT".to_string())
        );
    }

    #[test]
    fn test_empty_value_is_missing() {
        let err = ObservabilityConfig::from_lookup(lookup(&[
            ("OTEL_SERVICE_NAME", "svc"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "  "),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(_)));
    }

    #[test]
    fn test_malformed_endpoint() {
        for bad in ["not a url", "ftp://collector:21", "localhost:4317"] {
            let err = ObservabilityConfig::from_lookup(lookup(&[
                ("OTEL_SERVICE_NAME", "svc"),
                ("OTEL_EXPORTER_OTLP_ENDPOINT", bad),
            ]))
            .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { .. }), "{bad}");
        }
    }

    #[test]
    fn test_bare_token_header() {
        let mut vars = base();
        vars.push(("OTEL_EXPORTER_OTLP_HEADERS", "abc123"));
        let config = ObservabilityConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(
            config.headers,
            vec![("Authorization".to_string(), "Api-Token abc123".to_string())]
        );
    }

    #[test]
    fn test_header_list_is_decoded() {
        let mut vars = base();
        vars.push(("OTEL_EXPORTER_OTLP_HEADERS", "api-key=a%20b, x-team = core"));
        let config = ObservabilityConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(
            config.headers,
            vec![
                ("api-key".to_string(), "a b".to_string()),
                ("x-team".to_string(), "core".to_string()),
            ]
        );
    }

    #[test]
    fn test_flags_and_options() {
        let mut vars = base();
        vars.extend([
            ("OTEL_EXPORTER_OTLP_PROTOCOL", "grpc"),
            ("OTEL_TRACES_SPAN_PROCESSOR", "simple"),
            ("OTEL_METRICS_ENABLED", "YES"),
            ("OTEL_LOGS_ENABLED", "0"),
            ("OBSERVE_SAVE_TRACES", "true"),
            ("OBSERVE_TRACE_DIR", "/tmp/captures"),
            ("OTEL_RESOURCE_ATTRIBUTES", "deployment.environment=dev"),
            ("OTEL_SERVICE_VERSION", "0.0.0"),
        ]);
        let config = ObservabilityConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.protocol, OtlpProtocol::Grpc);
        assert_eq!(config.span_processor, SpanProcessorKind::Simple);
        assert!(config.enable_metrics);
        assert!(!config.enable_logs);
        assert!(config.save_traces);
        assert!(!config.show_traces);
        assert_eq!(config.trace_dir, PathBuf::from("/tmp/captures"));
        assert_eq!(config.service_version.as_deref(), Some("0.0.0"));
        assert_eq!(
            config.resource_attributes,
            vec![("deployment.environment".to_string(), "dev".to_string())]
        );
    }

    #[test]
    fn test_invalid_flag() {
        let mut vars = base();
        vars.push(("OTEL_METRICS_ENABLED", "maybe"));
        let err = ObservabilityConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert_eq!(
            err,
            ConfigError::invalid("OTEL_METRICS_ENABLED", "expected a boolean flag, got 'maybe'")
        );
    }

    #[test]
    fn test_invalid_protocol() {
        let mut vars = base();
        vars.push(("OTEL_EXPORTER_OTLP_PROTOCOL", "carrier-pigeon"));
        let err = ObservabilityConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "OTEL_EXPORTER_OTLP_PROTOCOL"));
    }

    #[test]
    fn test_debug_redacts_headers() {
        let config = ObservabilityConfig::new("svc", "http://localhost:4318")
            .with_header("Authorization", "Api-Token secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_builder() {
        let config = ObservabilityConfig::new("svc", "http://localhost:4317/")
            .with_protocol(OtlpProtocol::Grpc)
            .with_log_level("debug")
            .with_show_traces(true);
        assert_eq!(config.otlp_endpoint, "http://localhost:4317");
        assert!(!config.protocol.is_http());
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert!(config.show_traces);
    }
}
