//! OpenTelemetry provider setup for version 0.31.0
//!
//! Builds the tracer, meter and logger providers that export over OTLP and
//! installs the `tracing` subscriber that feeds them.
//!
//! Based on OpenTelemetry Rust 0.31 API patterns from:
//! https://docs.rs/opentelemetry-otlp/0.31.0/opentelemetry_otlp/

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use opentelemetry::metrics::{Meter, MeterProvider};
use opentelemetry::{global, trace::TracerProvider, KeyValue};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::tonic_types::metadata::MetadataMap;
use opentelemetry_otlp::{Protocol, WithExportConfig, WithHttpConfig, WithTonicConfig};
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

use crate::config::{ObservabilityConfig, OtlpProtocol, SpanProcessorKind};
use crate::error::ObservabilityError;

/// Exporter timeout used by [`init_from_env`]
pub const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_secs(30);

/// Targets whose events never reach the OTLP log bridge; exporting them would
/// generate more telemetry from the exporter itself.
const LOG_BRIDGE_EXCLUDED_TARGETS: &[&str] = &["opentelemetry", "hyper", "tonic", "h2", "reqwest"];

/// Handle to the providers built by [`create_tracer_provider`].
///
/// Pass it by reference to everything that emits telemetry. Dropping it
/// shuts every provider down if [`shutdown`](Self::shutdown) was not called.
pub struct TelemetryProviders {
    tracer_provider: SdkTracerProvider,
    meter_provider: Option<SdkMeterProvider>,
    logger_provider: Option<SdkLoggerProvider>,
    shut_down: AtomicBool,
}

impl TelemetryProviders {
    /// Wrap an already built tracer provider. Used when the exporter is not
    /// OTLP, e.g. an in-memory exporter.
    pub fn new(tracer_provider: SdkTracerProvider) -> Self {
        Self {
            tracer_provider,
            meter_provider: None,
            logger_provider: None,
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn with_meter_provider(mut self, provider: SdkMeterProvider) -> Self {
        self.meter_provider = Some(provider);
        self
    }

    pub fn with_logger_provider(mut self, provider: SdkLoggerProvider) -> Self {
        self.logger_provider = Some(provider);
        self
    }

    pub fn tracer(&self, name: impl Into<Cow<'static, str>>) -> SdkTracer {
        self.tracer_provider.tracer(name)
    }

    /// Meter from the configured meter provider, or a no-op meter from the
    /// global registry when metrics are disabled.
    pub fn meter(&self, name: &'static str) -> Meter {
        match &self.meter_provider {
            Some(provider) => provider.meter(name),
            None => global::meter(name),
        }
    }

    pub fn tracer_provider(&self) -> &SdkTracerProvider {
        &self.tracer_provider
    }

    pub fn meter_provider(&self) -> Option<&SdkMeterProvider> {
        self.meter_provider.as_ref()
    }

    pub fn logger_provider(&self) -> Option<&SdkLoggerProvider> {
        self.logger_provider.as_ref()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Export everything buffered so far without shutting down.
    pub fn force_flush(&self) -> Result<(), ObservabilityError> {
        if self.is_shut_down() {
            return Ok(());
        }
        let mut failures = Vec::new();
        if let Err(e) = self.tracer_provider.force_flush() {
            failures.push(format!("traces: {e}"));
        }
        if let Some(provider) = &self.meter_provider {
            if let Err(e) = provider.force_flush() {
                failures.push(format!("metrics: {e}"));
            }
        }
        if let Some(provider) = &self.logger_provider {
            if let Err(e) = provider.force_flush() {
                failures.push(format!("logs: {e}"));
            }
        }
        report("flush", failures)
    }

    /// Flush and shut down every provider. Only the first call does any work.
    pub fn shutdown(&self) -> Result<(), ObservabilityError> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            tracing::debug!("Telemetry providers already shut down");
            return Ok(());
        }
        let mut failures = Vec::new();
        if let Err(e) = self.tracer_provider.shutdown() {
            failures.push(format!("traces: {e}"));
        }
        if let Some(provider) = &self.meter_provider {
            if let Err(e) = provider.shutdown() {
                failures.push(format!("metrics: {e}"));
            }
        }
        if let Some(provider) = &self.logger_provider {
            if let Err(e) = provider.shutdown() {
                failures.push(format!("logs: {e}"));
            }
        }
        tracing::debug!("OpenTelemetry providers shut down");
        report("shutdown", failures)
    }
}

impl Drop for TelemetryProviders {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

fn report(action: &str, failures: Vec<String>) -> Result<(), ObservabilityError> {
    if failures.is_empty() {
        return Ok(());
    }
    let message = failures.join("; ");
    tracing::warn!(error = %message, "Telemetry {} reported errors", action);
    Err(ObservabilityError::Shutdown(message))
}

/// Builds one exporter of any signal for the configured transport.
macro_rules! otlp_exporter {
    ($builder:expr, $config:expr, $timeout:expr, $path:expr) => {{
        let config: &ObservabilityConfig = $config;
        match config.protocol {
            OtlpProtocol::Grpc => $builder
                .with_tonic()
                .with_endpoint(config.otlp_endpoint.clone())
                .with_timeout($timeout)
                .with_metadata(grpc_metadata(&config.headers)?)
                .build(),
            OtlpProtocol::HttpProtobuf | OtlpProtocol::HttpJson => $builder
                .with_http()
                .with_protocol(http_protocol(config.protocol))
                .with_endpoint(signal_endpoint(&config.otlp_endpoint, $path))
                .with_timeout($timeout)
                .with_headers(http_headers(&config.headers))
                .build(),
        }
        .map_err(|e| ObservabilityError::InitFailed(e.to_string()))
    }};
}

/// Build the OTLP tracer provider (plus meter and logger providers when
/// enabled) and register them as the process-wide providers.
///
/// Calling this again replaces the global providers; the previous handle
/// still owns its exporters and should be shut down by its owner.
/// Unreachable collectors are not detected here, they surface as export
/// errors in the log.
pub fn create_tracer_provider(
    config: &ObservabilityConfig,
    timeout: Duration,
) -> Result<TelemetryProviders, ObservabilityError> {
    let resource = build_resource(config);

    let span_exporter = otlp_exporter!(
        opentelemetry_otlp::SpanExporter::builder(),
        config,
        timeout,
        "/v1/traces"
    )?;
    let builder = SdkTracerProvider::builder().with_resource(resource.clone());
    let builder = match config.span_processor {
        SpanProcessorKind::Simple => builder.with_simple_exporter(span_exporter),
        SpanProcessorKind::Batch => builder.with_batch_exporter(span_exporter),
    };
    let tracer_provider = builder.build();
    global::set_tracer_provider(tracer_provider.clone());

    let mut providers = TelemetryProviders::new(tracer_provider);

    if config.enable_metrics {
        let metric_exporter = otlp_exporter!(
            opentelemetry_otlp::MetricExporter::builder(),
            config,
            timeout,
            "/v1/metrics"
        )?;
        let meter_provider = SdkMeterProvider::builder()
            .with_periodic_exporter(metric_exporter)
            .with_resource(resource.clone())
            .build();
        global::set_meter_provider(meter_provider.clone());
        providers = providers.with_meter_provider(meter_provider);
    }

    if config.enable_logs {
        let log_exporter = otlp_exporter!(
            opentelemetry_otlp::LogExporter::builder(),
            config,
            timeout,
            "/v1/logs"
        )?;
        let logger_provider = SdkLoggerProvider::builder()
            .with_batch_exporter(log_exporter)
            .with_resource(resource)
            .build();
        providers = providers.with_logger_provider(logger_provider);
    }

    tracing::info!(
        service.name = %config.service_name,
        otlp.endpoint = %config.otlp_endpoint,
        otlp.protocol = ?config.protocol,
        metrics = config.enable_metrics,
        logs = config.enable_logs,
        "OTLP telemetry providers created"
    );

    Ok(providers)
}

fn build_resource(config: &ObservabilityConfig) -> Resource {
    let mut attributes = vec![KeyValue::new("service.name", config.service_name.clone())];

    if let Some(version) = &config.service_version {
        attributes.push(KeyValue::new("service.version", version.clone()));
    }

    for (key, value) in &config.resource_attributes {
        attributes.push(KeyValue::new(key.clone(), value.clone()));
    }

    // In 0.31, Resource constructors are private; ResourceBuilder is the public API
    Resource::builder().with_attributes(attributes).build()
}

fn http_protocol(protocol: OtlpProtocol) -> Protocol {
    match protocol {
        OtlpProtocol::HttpJson => Protocol::HttpJson,
        OtlpProtocol::Grpc => Protocol::Grpc,
        OtlpProtocol::HttpProtobuf => Protocol::HttpBinary,
    }
}

/// HTTP exporters take the full per-signal URL.
pub(crate) fn signal_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with(path) {
        base.to_string()
    } else {
        format!("{base}{path}")
    }
}

fn http_headers(headers: &[(String, String)]) -> HashMap<String, String> {
    headers.iter().cloned().collect()
}

fn grpc_metadata(headers: &[(String, String)]) -> Result<MetadataMap, ObservabilityError> {
    let mut map = http::HeaderMap::new();
    for (key, value) in headers {
        let name = http::HeaderName::from_bytes(key.to_ascii_lowercase().as_bytes())
            .map_err(|e| ObservabilityError::InitFailed(format!("header '{key}': {e}")))?;
        let value = http::HeaderValue::from_str(value)
            .map_err(|e| ObservabilityError::InitFailed(format!("header '{key}': {e}")))?;
        map.insert(name, value);
    }
    Ok(MetadataMap::from_headers(map))
}

/// Install the global `tracing` subscriber wired to `providers`.
///
/// Layers: env filter, optional console output, span bridge to the tracer
/// provider, and the log bridge when a logger provider exists. A second
/// call fails with [`ObservabilityError::InitFailed`].
pub fn init(
    config: &ObservabilityConfig,
    providers: &TelemetryProviders,
) -> Result<(), ObservabilityError> {
    let env_filter = config
        .log_level
        .as_ref()
        .map(|level| tracing_subscriber::EnvFilter::new(level.as_str()))
        .unwrap_or_else(|| {
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        });

    // Build layers first (build separately, then compose once to avoid type mismatch)
    let fmt_layer = config
        .enable_console
        .then(|| tracing_subscriber::fmt::layer().with_target(false));

    let otel_layer = OpenTelemetryLayer::new(providers.tracer(config.service_name.clone()));

    let log_layer = providers.logger_provider().map(|provider| {
        OpenTelemetryTracingBridge::new(provider).with_filter(filter_fn(|meta| {
            !LOG_BRIDGE_EXCLUDED_TARGETS
                .iter()
                .any(|target| meta.target().starts_with(target))
        }))
    });

    Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .with(log_layer)
        .try_init()
        .map_err(|e| ObservabilityError::InitFailed(e.to_string()))?;

    tracing::info!(
        service.name = %config.service_name,
        "Tracing initialized"
    );
    Ok(())
}

/// Load configuration from the environment, create providers with the
/// default timeout and install the subscriber.
pub fn init_from_env() -> Result<TelemetryProviders, ObservabilityError> {
    let config = ObservabilityConfig::from_env()?;
    let providers = create_tracer_provider(&config, DEFAULT_EXPORT_TIMEOUT)?;
    init(&config, &providers)?;
    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{Span, Tracer};
    use opentelemetry_sdk::trace::InMemorySpanExporter;

    #[test]
    fn test_signal_endpoint() {
        assert_eq!(
            signal_endpoint("https://otlp.nr-data.net", "/v1/traces"),
            "https://otlp.nr-data.net/v1/traces"
        );
        assert_eq!(
            signal_endpoint("http://localhost:4318/v1/traces/", "/v1/traces"),
            "http://localhost:4318/v1/traces"
        );
        assert_eq!(
            signal_endpoint("http://localhost:4318/", "/v1/logs"),
            "http://localhost:4318/v1/logs"
        );
    }

    #[test]
    fn test_grpc_metadata_lowercases_keys() {
        let metadata = grpc_metadata(&[("Authorization".to_string(), "Api-Token x".to_string())])
            .unwrap();
        let headers = metadata.into_headers();
        assert_eq!(headers.get("authorization").unwrap(), "Api-Token x");
    }

    #[test]
    fn test_grpc_metadata_rejects_bad_name() {
        let err = grpc_metadata(&[("bad header".to_string(), "v".to_string())]).unwrap_err();
        assert!(matches!(err, ObservabilityError::InitFailed(_)));
    }

    #[test]
    fn test_resource_has_service_attributes() {
        let config = ObservabilityConfig::new("bedrock-agent", "http://localhost:4318")
            .with_version("0.0.0")
            .with_resource_attribute("team", "agents");
        let resource = build_resource(&config);
        let get = |key: &'static str| {
            resource
                .get(&opentelemetry::Key::from_static_str(key))
                .map(|v| v.to_string())
        };
        assert_eq!(get("service.name").as_deref(), Some("bedrock-agent"));
        assert_eq!(get("service.version").as_deref(), Some("0.0.0"));
        assert_eq!(get("team").as_deref(), Some("agents"));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let providers = TelemetryProviders::new(provider);

        let tracer = providers.tracer("test");
        let mut span = tracer.start("one");
        span.end();
        assert_eq!(exporter.get_finished_spans().unwrap().len(), 1);

        assert!(providers.shutdown().is_ok());
        assert!(providers.is_shut_down());
        assert!(providers.shutdown().is_ok());
        assert!(providers.force_flush().is_ok());
    }
}
