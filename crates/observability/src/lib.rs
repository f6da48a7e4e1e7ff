//! Invocation observability for Bedrock agents
//!
//! Loads OTLP exporter settings from the environment, builds the tracer,
//! meter and logger providers, and wraps agent invocations in client spans
//! with a fixed attribute schema.
//!
//! # Quick Start
//!
//! ```no_run
//! use inline_agent_observability::{create_tracer_provider, ObservabilityConfig, Observer};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! // Fails fast when OTEL_SERVICE_NAME or OTEL_EXPORTER_OTLP_ENDPOINT is missing
//! let config = ObservabilityConfig::from_env()?;
//! let providers = create_tracer_provider(&config, Duration::from_secs(300))?;
//! let observer = Observer::from_providers(&providers, &config);
//!
//! let args = serde_json::json!({"sessionId": "abc-123", "inputText": "hello"});
//! let reply = observer
//!     .observe(args, |_args| async { Ok::<_, std::io::Error>("hi".to_string()) })
//!     .await?;
//!
//! providers.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Environment Variables
//!
//! - `OTEL_SERVICE_NAME` or `SERVICE_NAME` - Service name (required)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT` - OTLP collector URL (required)
//! - `OTEL_EXPORTER_OTLP_HEADERS` - `k=v,...` headers or a bare API token
//! - `OTEL_EXPORTER_OTLP_PROTOCOL` - `grpc`, `http/protobuf` or `http/json`
//! - `OTEL_LOG_LEVEL` or `RUST_LOG` - Log level filter
//! - `OBSERVE_SHOW_TRACES`, `OBSERVE_SAVE_TRACES`, `OBSERVE_TRACE_DIR` - trace captures
//!
//! See [`ObservabilityConfig::from_env`] for the full list.

pub mod attributes;
pub mod capture;
pub mod config;
pub mod error;
pub mod metrics;
pub mod observe;
pub mod telemetry;
pub mod tracing;

pub use capture::{CaptureStatus, TraceCapture};
pub use config::{EnvReader, ObservabilityConfig, OtlpProtocol, SpanProcessorKind};
pub use error::{ConfigError, ObservabilityError};
pub use metrics::InvocationMetrics;
pub use observe::{ErrorType, ObserveOptions, ObservedStream, Observer, StreamEvent};
pub use telemetry::{
    create_tracer_provider, init, init_from_env, TelemetryProviders, DEFAULT_EXPORT_TIMEOUT,
};
pub use crate::tracing::{record_duration, record_error};

// Macros are automatically exported via #[macro_export] and available
// as inline_agent_observability::tool_span!(), etc.
