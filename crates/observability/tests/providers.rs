use std::time::Duration;

use inline_agent_observability::{
    create_tracer_provider, ObservabilityConfig, ObservabilityError, OtlpProtocol,
    SpanProcessorKind, TelemetryProviders,
};
use opentelemetry::trace::{Span, Tracer};
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};

fn config(protocol: OtlpProtocol) -> ObservabilityConfig {
    // Nothing listens here; no span is exported so no connection is attempted.
    ObservabilityConfig::new("bedrock-agent", "http://127.0.0.1:9")
        .with_protocol(protocol)
        .with_header("Authorization", "Api-Token test")
        .with_span_processor(SpanProcessorKind::Simple)
        .with_console(false)
}

#[test]
fn test_factory_twice_then_shutdown_both() {
    let first = create_tracer_provider(&config(OtlpProtocol::HttpProtobuf), Duration::from_secs(1))
        .unwrap();
    let second =
        create_tracer_provider(&config(OtlpProtocol::HttpProtobuf), Duration::from_secs(1))
            .unwrap();

    assert!(first.shutdown().is_ok());
    assert!(second.shutdown().is_ok());
    assert!(first.is_shut_down());
    assert!(second.is_shut_down());

    // Second shutdown is a no-op
    assert!(first.shutdown().is_ok());
    assert!(second.shutdown().is_ok());
}

#[test]
fn test_shutdown_exports_once_and_stops_recording() {
    let exporter = InMemorySpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    let providers = TelemetryProviders::new(provider);
    let tracer = providers.tracer("shutdown-tests");

    let mut before = tracer.start("before-shutdown");
    before.end();

    assert!(providers.shutdown().is_ok());
    assert!(providers.shutdown().is_ok());
    assert!(providers.is_shut_down());

    let mut after = tracer.start("after-shutdown");
    after.end();
    drop(providers);

    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].name, "before-shutdown");
}

#[test]
fn test_http_json_with_metrics_and_logs() {
    let cfg = config(OtlpProtocol::HttpJson)
        .with_metrics(true)
        .with_logs(true)
        .with_span_processor(SpanProcessorKind::Batch);
    let providers = create_tracer_provider(&cfg, Duration::from_secs(1)).unwrap();

    assert!(providers.meter_provider().is_some());
    assert!(providers.logger_provider().is_some());
    drop(providers);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_grpc_exporter_builds() {
    let providers =
        create_tracer_provider(&config(OtlpProtocol::Grpc), Duration::from_secs(1)).unwrap();
    assert!(providers.meter_provider().is_none());
    assert!(providers.shutdown().is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_grpc_rejects_invalid_header_name() {
    let cfg = config(OtlpProtocol::Grpc).with_header("bad header", "x");
    let err = create_tracer_provider(&cfg, Duration::from_secs(1))
        .err()
        .unwrap();
    assert!(matches!(err, ObservabilityError::InitFailed(_)));
}
