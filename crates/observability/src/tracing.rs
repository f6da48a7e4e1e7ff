//! Utility functions for tracing

/// Create a span for one action-group function dispatch
///
/// # Example
///
/// ```rust
/// use inline_agent_observability::tool_span;
///
/// let span = tool_span!("WeatherGroup", "get_weather");
/// let _guard = span.enter();
/// // ... run the tool ...
/// ```
#[macro_export]
macro_rules! tool_span {
    ($action_group:expr, $function:expr) => {
        tracing::info_span!(
            "tool.call",
            action_group = $action_group,
            tool.name = $function,
            error = tracing::field::Empty,
            error.message = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        )
    };
}

/// Create a span for one MCP JSON-RPC request
///
/// # Example
///
/// ```rust
/// use inline_agent_observability::mcp_request_span;
///
/// let span = mcp_request_span!("time-server", "tools/call");
/// let _guard = span.enter();
/// ```
#[macro_export]
macro_rules! mcp_request_span {
    ($server:expr, $method:expr) => {
        tracing::debug_span!(
            "mcp.request",
            mcp.server = $server,
            rpc.method = $method,
            error = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    };
}

/// Record an error on the current span
///
/// The span must declare `error` and `error.message` fields, as the spans
/// created by [`tool_span!`] and [`mcp_request_span!`] do.
///
/// # Example
///
/// ```rust
/// use inline_agent_observability::{record_error, tool_span};
///
/// let span = tool_span!("group", "fn");
/// let _guard = span.enter();
/// let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
/// record_error(&err);
/// ```
pub fn record_error<E: std::fmt::Display + ?Sized>(error: &E) {
    let span = tracing::Span::current();
    span.record("error", true);
    span.record("error.message", error.to_string());
    tracing::warn!(error = %error, "Operation failed");
}

/// Record latency/duration on the current span
///
/// # Example
///
/// ```rust
/// use inline_agent_observability::{record_duration, tool_span};
/// use std::time::Instant;
///
/// let span = tool_span!("group", "fn");
/// let _guard = span.enter();
/// let start = Instant::now();
/// // ... operation ...
/// record_duration("duration_ms", start.elapsed());
/// ```
pub fn record_duration(key: &str, duration: std::time::Duration) {
    let span = tracing::Span::current();
    span.record(key, duration.as_millis() as u64);
}
