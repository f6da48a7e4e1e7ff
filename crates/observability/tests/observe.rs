mod common;

use std::time::{Duration, SystemTime};

use common::{attr, harness, TimeoutError};
use futures::{stream, StreamExt};
use inline_agent_core::{AgentError, AgentEvent, InvokeRequest};
use inline_agent_observability::attributes::{
    AGENT_ID, COMPLETION, ERROR_MESSAGE, ERROR_TYPE, OPERATION_NAME, PROMPT, RESPONSE_EVENT_COUNT,
    RESPONSE_KIND, SESSION_ID, SYSTEM,
};
use inline_agent_observability::{ObservabilityConfig, ObserveOptions, TraceCapture};
use opentelemetry::trace::{Span, SpanKind, Status, Tracer, TracerProvider};
use opentelemetry_sdk::trace::SpanData;

fn request() -> InvokeRequest {
    InvokeRequest::new("AGENT1", "ALIAS1", "hello").with_session_id("abc-123")
}

#[tokio::test]
async fn test_buffered_success_emits_one_ok_span() {
    let h = harness(ObserveOptions::default());

    let reply = h
        .observer
        .observe(request(), |req| async move {
            Ok::<_, TimeoutError>(format!("echo: {}", req.input_text))
        })
        .await;

    assert_eq!(reply.unwrap(), "echo: hello");
    let span = h.single_span();
    assert_eq!(span.name, "invoke_agent AGENT1");
    assert_eq!(span.span_kind, SpanKind::Client);
    assert_eq!(span.status, Status::Ok);
    assert_eq!(attr(&span, OPERATION_NAME).as_deref(), Some("invoke_agent"));
    assert_eq!(attr(&span, SYSTEM).as_deref(), Some("aws.bedrock"));
    assert_eq!(attr(&span, SESSION_ID).as_deref(), Some("abc-123"));
    assert_eq!(attr(&span, PROMPT).as_deref(), Some("hello"));
    assert_eq!(attr(&span, AGENT_ID).as_deref(), Some("AGENT1"));
    assert_eq!(attr(&span, RESPONSE_KIND).as_deref(), Some("buffered"));
    assert_eq!(attr(&span, ERROR_TYPE), None);
}

#[tokio::test]
async fn test_error_is_recorded_and_returned_unchanged() {
    let h = harness(ObserveOptions::default());

    let result = h
        .observer
        .observe(request(), |_| async {
            Err::<String, _>(TimeoutError { after_ms: 300_000 })
        })
        .await;

    assert_eq!(result.unwrap_err(), TimeoutError { after_ms: 300_000 });
    let span = h.single_span();
    assert!(matches!(span.status, Status::Error { .. }));
    assert_eq!(attr(&span, ERROR_TYPE).as_deref(), Some("TimeoutError"));
    assert_eq!(
        attr(&span, ERROR_MESSAGE).as_deref(),
        Some("read timed out after 300000ms")
    );
}

#[tokio::test]
async fn test_agent_error_type_is_variant() {
    let h = harness(ObserveOptions::default());

    let result = h
        .observer
        .observe(request(), |_| async {
            Err::<String, _>(AgentError::Timeout(300_000))
        })
        .await;

    assert!(matches!(result, Err(AgentError::Timeout(300_000))));
    let span = h.single_span();
    assert_eq!(attr(&span, ERROR_TYPE).as_deref(), Some("Timeout"));
}

fn find<'a>(spans: &'a [SpanData], name: &str) -> &'a SpanData {
    spans
        .iter()
        .find(|span| span.name == name)
        .unwrap_or_else(|| panic!("no span named {name}"))
}

#[tokio::test]
async fn test_spans_started_in_call_are_children() {
    let h = harness(ObserveOptions::default());
    let tracer = h.provider.tracer("tool-tests");

    h.observer
        .observe(request(), |_| async move {
            tokio::task::yield_now().await;
            let mut span = tracer.start("tool.call");
            span.end();
            Ok::<_, TimeoutError>(())
        })
        .await
        .unwrap();

    let spans = h.spans();
    assert_eq!(spans.len(), 2);
    let invocation = find(&spans, "invoke_agent AGENT1");
    let child = find(&spans, "tool.call");
    assert_eq!(child.parent_span_id, invocation.span_context.span_id());
    assert_eq!(
        child.span_context.trace_id(),
        invocation.span_context.trace_id()
    );
}

#[tokio::test]
async fn test_spans_started_while_streaming_are_children() {
    let h = harness(ObserveOptions::default());
    let tracer = h.provider.tracer("tool-tests");

    let observed = h
        .observer
        .observe_stream(request(), |_| async move {
            let events = stream::iter(vec![
                Ok::<_, AgentError>(AgentEvent::chunk("a")),
                Ok(AgentEvent::chunk("b")),
            ])
            .map(move |event| {
                let mut span = tracer.start("chunk.handler");
                span.end();
                event
            });
            Ok::<_, AgentError>(events)
        })
        .await
        .unwrap();
    observed.completion().await.unwrap();

    let spans = h.spans();
    assert_eq!(spans.len(), 3);
    let invocation = find(&spans, "invoke_agent AGENT1");
    for child in spans.iter().filter(|span| span.name == "chunk.handler") {
        assert_eq!(child.parent_span_id, invocation.span_context.span_id());
    }
}

#[tokio::test]
async fn test_span_open_across_await() {
    let h = harness(ObserveOptions::default());
    let started = SystemTime::now();

    h.observer
        .observe(request(), |_| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, TimeoutError>(())
        })
        .await
        .unwrap();

    let span = h.single_span();
    let duration = span.end_time.duration_since(span.start_time).unwrap();
    assert!(duration >= Duration::from_millis(20));
    assert!(span.start_time >= started - Duration::from_millis(1));
}

#[tokio::test]
async fn test_dropped_future_records_cancellation() {
    let h = harness(ObserveOptions::default());

    let outcome = tokio::time::timeout(
        Duration::from_millis(10),
        h.observer.observe(request(), |_| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, TimeoutError>(())
        }),
    )
    .await;

    assert!(outcome.is_err());
    let span = h.single_span();
    assert!(matches!(span.status, Status::Error { .. }));
    assert_eq!(attr(&span, ERROR_TYPE).as_deref(), Some("Cancelled"));
}

#[tokio::test]
async fn test_stream_span_ends_after_last_element() {
    let h = harness(ObserveOptions::default());
    let events: Vec<Result<AgentEvent, AgentError>> = vec![
        Ok(AgentEvent::trace(serde_json::json!({"step": "pre"}))),
        Ok(AgentEvent::chunk("Hello, ")),
        Ok(AgentEvent::chunk("world")),
    ];

    let mut observed = h
        .observer
        .observe_stream(request(), |_| async move {
            let delayed = stream::iter(events).then(|event| async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                event
            });
            Ok::<_, AgentError>(Box::pin(delayed))
        })
        .await
        .unwrap();

    let first = observed.next().await.unwrap().unwrap();
    assert_eq!(first.kind(), "trace");
    assert!(h.spans().is_empty(), "span must stay open while draining");

    let mut last_seen = SystemTime::now();
    while let Some(event) = observed.next().await {
        event.unwrap();
        last_seen = SystemTime::now();
    }

    let span = h.single_span();
    assert_eq!(span.status, Status::Ok);
    assert!(span.end_time >= last_seen);
    assert_eq!(attr(&span, RESPONSE_KIND).as_deref(), Some("streamed"));
    assert_eq!(attr(&span, RESPONSE_EVENT_COUNT).as_deref(), Some("3"));
    assert_eq!(attr(&span, COMPLETION).as_deref(), Some("Hello, world"));
    assert_eq!(span.events.events.len(), 3);
    assert_eq!(span.events.events[0].name, "agent.event");
}

#[tokio::test]
async fn test_stream_completion_collects_text() {
    let h = harness(ObserveOptions::default());

    let observed = h
        .observer
        .observe_stream(request(), |_| async {
            Ok::<_, AgentError>(stream::iter(vec![
                Ok::<_, AgentError>(AgentEvent::chunk("Paris")),
                Ok(AgentEvent::chunk(" is the capital.")),
            ]))
        })
        .await
        .unwrap();

    let completion = observed.completion().await.unwrap();
    assert_eq!(completion.text, "Paris is the capital.");
    assert_eq!(completion.event_count(), 2);
    assert_eq!(h.single_span().status, Status::Ok);
}

#[tokio::test]
async fn test_stream_error_item_ends_span_with_error() {
    let h = harness(ObserveOptions::default());

    let mut observed = h
        .observer
        .observe_stream(request(), |_| async {
            Ok::<_, AgentError>(stream::iter(vec![
                Ok(AgentEvent::chunk("partial")),
                Err(AgentError::Stream("throttled".to_string())),
                Ok(AgentEvent::chunk("never seen")),
            ]))
        })
        .await
        .unwrap();

    assert!(observed.next().await.unwrap().is_ok());
    let err = observed.next().await.unwrap().unwrap_err();
    assert_eq!(err.to_string(), "response stream error: throttled");
    assert!(observed.next().await.is_none());

    let span = h.single_span();
    assert!(matches!(span.status, Status::Error { .. }));
    assert_eq!(attr(&span, ERROR_TYPE).as_deref(), Some("Stream"));
    assert_eq!(attr(&span, RESPONSE_EVENT_COUNT).as_deref(), Some("1"));
}

#[tokio::test]
async fn test_dropped_stream_records_cancellation() {
    let h = harness(ObserveOptions::default());

    let mut observed = h
        .observer
        .observe_stream(request(), |_| async {
            Ok::<_, AgentError>(stream::iter(vec![
                Ok::<_, AgentError>(AgentEvent::chunk("a")),
                Ok(AgentEvent::chunk("b")),
            ]))
        })
        .await
        .unwrap();
    observed.next().await.unwrap().unwrap();
    drop(observed);

    let span = h.single_span();
    assert_eq!(attr(&span, ERROR_TYPE).as_deref(), Some("Cancelled"));
}

#[tokio::test]
async fn test_call_failing_before_stream() {
    let h = harness(ObserveOptions::default());

    let result = h
        .observer
        .observe_stream(request(), |_| async {
            Err::<stream::Iter<std::vec::IntoIter<Result<AgentEvent, AgentError>>>, _>(
                AgentError::Invocation("AccessDenied".to_string()),
            )
        })
        .await;

    assert!(matches!(result, Err(AgentError::Invocation(_))));
    let span = h.single_span();
    assert!(matches!(span.status, Status::Error { .. }));
    assert_eq!(
        attr(&span, ERROR_MESSAGE).as_deref(),
        Some("invocation failed: AccessDenied")
    );
}

#[tokio::test]
async fn test_custom_operation_and_unnamed_agent() {
    let h = harness(ObserveOptions::default().with_operation("invoke_inline_agent"));

    h.observer
        .observe(serde_json::json!({"inputText": "hi"}), |_| async {
            Ok::<_, TimeoutError>(())
        })
        .await
        .unwrap();

    let span = h.single_span();
    assert_eq!(span.name, "invoke_inline_agent");
    assert_eq!(
        attr(&span, OPERATION_NAME).as_deref(),
        Some("invoke_inline_agent")
    );
    assert_eq!(attr(&span, SESSION_ID), None);
}

#[tokio::test]
async fn test_save_traces_writes_capture() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(
        ObserveOptions::default()
            .with_save_traces(true)
            .with_trace_dir(dir.path()),
    );

    h.observer
        .observe(request(), |_| async { Ok::<_, TimeoutError>(()) })
        .await
        .unwrap();

    let files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(files.len(), 1);
    let name = files[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("trace-abc-123-"));

    let capture = TraceCapture::load(&files[0]).unwrap();
    let span = h.single_span();
    assert!(capture.is_ok());
    assert_eq!(capture.span_id, span.span_context.span_id().to_string());
    assert_eq!(capture.session_id(), Some("abc-123"));
    assert_eq!(capture.attributes.get(PROMPT).map(String::as_str), Some("hello"));
}

#[tokio::test]
async fn test_save_failure_does_not_change_result() {
    let blocker = tempfile::NamedTempFile::new().unwrap();
    let h = harness(
        ObserveOptions::default()
            .with_save_traces(true)
            .with_trace_dir(blocker.path().join("sub")),
    );

    let result = h
        .observer
        .observe(request(), |_| async {
            Err::<(), _>(TimeoutError { after_ms: 1 })
        })
        .await;

    assert_eq!(result.unwrap_err(), TimeoutError { after_ms: 1 });
    assert_eq!(h.spans().len(), 1);
}

#[tokio::test]
async fn test_missing_config_fails_before_any_span() {
    let h = harness(ObserveOptions::default());

    let loaded = ObservabilityConfig::from_lookup(|key| match key {
        "OTEL_SERVICE_NAME" => Some("bedrock-agent".to_string()),
        _ => None,
    });

    assert!(loaded.is_err());
    assert!(h.spans().is_empty());
}
