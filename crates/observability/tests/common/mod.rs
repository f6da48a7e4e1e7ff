//! Common test utilities for span assertions.

use inline_agent_observability::{ErrorType, ObserveOptions, Observer};
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracer, SdkTracerProvider, SpanData};

/// Observer exporting synchronously into memory.
pub struct Harness {
    pub observer: Observer<SdkTracer>,
    pub exporter: InMemorySpanExporter,
    pub provider: SdkTracerProvider,
}

pub fn harness(options: ObserveOptions) -> Harness {
    let exporter = InMemorySpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    let observer = Observer::new(provider.tracer("observe-tests")).with_options(options);
    Harness {
        observer,
        exporter,
        provider,
    }
}

impl Harness {
    pub fn spans(&self) -> Vec<SpanData> {
        self.exporter.get_finished_spans().unwrap()
    }

    pub fn single_span(&self) -> SpanData {
        let spans = self.spans();
        assert_eq!(spans.len(), 1, "expected exactly one finished span");
        spans.into_iter().next().unwrap()
    }
}

/// String form of a span attribute.
pub fn attr(span: &SpanData, key: &str) -> Option<String> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.to_string())
}

/// Error raised by fake invocations.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeoutError {
    pub after_ms: u64,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "read timed out after {}ms", self.after_ms)
    }
}

impl std::error::Error for TimeoutError {}

impl ErrorType for TimeoutError {}
