//! Invocation span wrapper.
//!
//! [`Observer::observe`] and [`Observer::observe_stream`] bracket one agent
//! invocation in a client span. The span is owned by a guard that ends it
//! exactly once: on success, on the first error, or when the guard is dropped
//! early (the future or stream was abandoned), which records a cancellation.
//!
//! The span is also the current OpenTelemetry context while the call runs and
//! while the stream is polled, so spans started there become its children.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use chrono::Utc;
use futures::{ready, Stream, StreamExt};
use inline_agent_core::{AgentError, AgentEvent, Completion};
use opentelemetry::context::FutureExt as _;
use opentelemetry::trace::{Span, SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::KeyValue;
use serde::Serialize;

use crate::attributes::{
    self, InvocationAttributes, CANCELLED, DEFAULT_OPERATION, RESPONSE_EVENT_COUNT, RESPONSE_KIND,
};
use crate::capture::{CaptureStatus, CapturedEvent, ResponseKind, ResponseSummary, TraceCapture};
use crate::config::{ObservabilityConfig, DEFAULT_TRACE_DIR};
use crate::metrics::InvocationMetrics;
use crate::telemetry::TelemetryProviders;

/// Element of a streamed agent response.
pub trait StreamEvent {
    /// Short event class, e.g. `chunk` or `trace`
    fn kind(&self) -> &str;

    /// Completion text carried by this event, if any
    fn text(&self) -> Option<&str> {
        None
    }
}

impl StreamEvent for AgentEvent {
    fn kind(&self) -> &str {
        AgentEvent::kind(self)
    }

    fn text(&self) -> Option<&str> {
        AgentEvent::text(self)
    }
}

/// Classifies an error for the `error.type` span attribute.
///
/// Defaults to the short type name of the error. Error enums override it
/// to report the failing variant.
pub trait ErrorType: std::fmt::Display {
    fn error_type(&self) -> String {
        short_type_name::<Self>()
    }
}

impl ErrorType for AgentError {
    fn error_type(&self) -> String {
        self.kind().to_string()
    }
}

impl ErrorType for std::io::Error {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserveOptions {
    /// Log and print the trace capture after each invocation
    pub show_traces: bool,
    /// Persist the trace capture under `trace_dir`
    pub save_traces: bool,
    pub trace_dir: PathBuf,
    /// `gen_ai.operation.name` and span name prefix
    pub operation: String,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            show_traces: false,
            save_traces: false,
            trace_dir: PathBuf::from(DEFAULT_TRACE_DIR),
            operation: DEFAULT_OPERATION.to_string(),
        }
    }
}

impl ObserveOptions {
    pub fn from_config(config: &ObservabilityConfig) -> Self {
        Self {
            show_traces: config.show_traces,
            save_traces: config.save_traces,
            trace_dir: config.trace_dir.clone(),
            ..Default::default()
        }
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
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
}

/// Wraps invocation calls in spans from `tracer`.
#[derive(Debug)]
pub struct Observer<T> {
    tracer: T,
    options: ObserveOptions,
    metrics: Option<InvocationMetrics>,
}

impl Observer<opentelemetry_sdk::trace::SdkTracer> {
    /// Observer wired to `providers`, with options taken from `config`.
    /// Invocation metrics are recorded when a meter provider exists.
    pub fn from_providers(providers: &TelemetryProviders, config: &ObservabilityConfig) -> Self {
        let observer = Observer::new(providers.tracer(config.service_name.clone()))
            .with_options(ObserveOptions::from_config(config));
        match providers.meter_provider() {
            Some(_) => observer.with_metrics(InvocationMetrics::new(&providers.meter("inline-agent"))),
            None => observer,
        }
    }
}

impl<T> Observer<T>
where
    T: Tracer,
    T::Span: Send + Sync + 'static,
{
    pub fn new(tracer: T) -> Self {
        Self {
            tracer,
            options: ObserveOptions::default(),
            metrics: None,
        }
    }

    pub fn with_options(mut self, options: ObserveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_metrics(mut self, metrics: InvocationMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn options(&self) -> &ObserveOptions {
        &self.options
    }

    /// Run `call(args)` inside a span and return exactly what it returned.
    ///
    /// The span stays open across every suspension point of the call. An
    /// error is recorded on the span and handed back unchanged.
    pub async fn observe<A, F, Fut, R, E>(&self, args: A, call: F) -> Result<R, E>
    where
        A: Serialize,
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: ErrorType,
    {
        let mut guard = self.start(&args, ResponseKind::Buffered);
        let result = call(args).with_context(guard.context.clone()).await;
        match &result {
            Ok(_) => guard.finish(CaptureStatus::Ok),
            Err(e) => guard.finish(error_status(e)),
        }
        result
    }

    /// Run `call(args)` and wrap the stream it returns.
    ///
    /// The span ends when the returned [`ObservedStream`] is exhausted, yields
    /// its first error, or is dropped. A call that fails before producing a
    /// stream ends the span with that error.
    pub async fn observe_stream<A, F, Fut, S, Ev, E>(
        &self,
        args: A,
        call: F,
    ) -> Result<ObservedStream<S>, E>
    where
        A: Serialize,
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<S, E>>,
        S: Stream<Item = Result<Ev, E>> + Unpin,
        Ev: StreamEvent,
        E: ErrorType,
    {
        let mut guard = self.start(&args, ResponseKind::Streamed);
        match call(args).with_context(guard.context.clone()).await {
            Ok(inner) => Ok(ObservedStream {
                inner,
                guard,
                done: false,
            }),
            Err(e) => {
                guard.finish(error_status(&e));
                Err(e)
            }
        }
    }

    fn start<A: Serialize + ?Sized>(&self, args: &A, kind: ResponseKind) -> InvocationSpan {
        let request = InvocationAttributes::from_args(args);
        let operation = self.options.operation.clone();
        let span_name = request.span_name(&operation);

        let span = self
            .tracer
            .span_builder(span_name.clone())
            .with_kind(SpanKind::Client)
            .start(&self.tracer);
        let span_context = span.span_context();
        let trace_id = span_context.trace_id().to_string();
        let span_id = span_context.span_id().to_string();

        tracing::debug!(
            span = %span_name,
            session.id = request.session_id.as_deref().unwrap_or(""),
            "Invocation span started"
        );

        let mut guard = InvocationSpan {
            context: opentelemetry::Context::current_with_span(span),
            ended: false,
            span_name,
            trace_id,
            span_id,
            started_at: Utc::now(),
            started: Instant::now(),
            attributes: BTreeMap::new(),
            response: ResponseSummary {
                kind,
                ..Default::default()
            },
            operation: operation.clone(),
            options: self.options.clone(),
            metrics: self.metrics.clone(),
        };
        for kv in request.key_values(&operation) {
            guard.set_attribute(kv);
        }
        guard.set_attribute(KeyValue::new(RESPONSE_KIND, kind.as_str()));
        guard
    }
}

fn error_status<E: ErrorType>(error: &E) -> CaptureStatus {
    CaptureStatus::Error {
        error_type: error.error_type(),
        message: error.to_string(),
    }
}

/// `std::io::error::Error` → `Error`, `my::Wrapper<u8>` → `Wrapper`
pub(crate) fn short_type_name<E: ?Sized>() -> String {
    let full = std::any::type_name::<E>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// Open span plus everything needed to finish it and build its capture.
struct InvocationSpan {
    /// Context holding the invocation span as its active span
    context: opentelemetry::Context,
    ended: bool,
    span_name: String,
    trace_id: String,
    span_id: String,
    started_at: chrono::DateTime<Utc>,
    started: Instant,
    attributes: BTreeMap<String, String>,
    response: ResponseSummary,
    operation: String,
    options: ObserveOptions,
    metrics: Option<InvocationMetrics>,
}

impl InvocationSpan {
    fn set_attribute(&mut self, kv: KeyValue) {
        self.attributes
            .insert(kv.key.as_str().to_string(), kv.value.to_string());
        if !self.ended {
            self.context.span().set_attribute(kv);
        }
    }

    fn record_event<E: StreamEvent>(&mut self, event: &E) {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        let text = event.text().map(str::to_string);
        if let Some(text) = &text {
            self.response.completion.push_str(text);
        }
        self.response.event_count += 1;
        self.response.events.push(CapturedEvent {
            kind: event.kind().to_string(),
            elapsed_ms,
            text,
        });
        if !self.ended {
            self.context.span().add_event(
                "agent.event",
                vec![
                    KeyValue::new("event.kind", event.kind().to_string()),
                    KeyValue::new("elapsed_ms", elapsed_ms as i64),
                ],
            );
        }
    }

    /// Ends the span. Later calls are no-ops.
    fn finish(&mut self, status: CaptureStatus) {
        if self.ended {
            return;
        }
        let elapsed = self.started.elapsed();

        if self.response.kind == ResponseKind::Streamed {
            self.set_attribute(KeyValue::new(
                RESPONSE_EVENT_COUNT,
                self.response.event_count as i64,
            ));
        }
        if !self.response.completion.is_empty() {
            self.set_attribute(KeyValue::new(
                attributes::COMPLETION,
                self.response.completion.clone(),
            ));
        }
        let span_status = match &status {
            CaptureStatus::Ok => Status::Ok,
            CaptureStatus::Error {
                error_type,
                message,
            } => {
                self.set_attribute(KeyValue::new(attributes::ERROR_TYPE, error_type.clone()));
                self.set_attribute(KeyValue::new(attributes::ERROR_MESSAGE, message.clone()));
                Status::error(message.clone())
            }
            CaptureStatus::Cancelled => {
                let message = "invocation cancelled before completion";
                self.set_attribute(KeyValue::new(attributes::ERROR_TYPE, CANCELLED));
                self.set_attribute(KeyValue::new(attributes::ERROR_MESSAGE, message));
                Status::error(message)
            }
        };

        let span = self.context.span();
        span.set_status(span_status);
        span.end();
        self.ended = true;

        if let Some(metrics) = &self.metrics {
            metrics.record(&self.operation, status.as_str(), elapsed);
        }

        let capture = TraceCapture {
            span_name: self.span_name.clone(),
            trace_id: self.trace_id.clone(),
            span_id: self.span_id.clone(),
            started_at: self.started_at,
            ended_at: Utc::now(),
            duration_ms: elapsed.as_millis() as u64,
            status,
            attributes: std::mem::take(&mut self.attributes),
            response: std::mem::take(&mut self.response),
        };
        self.publish(&capture);
    }

    fn publish(&self, capture: &TraceCapture) {
        if self.options.show_traces {
            tracing::info!(
                span = %capture.span_name,
                trace_id = %capture.trace_id,
                status = capture.status.as_str(),
                duration_ms = capture.duration_ms,
                events = capture.response.event_count,
                "Invocation trace"
            );
            match capture.to_pretty_json() {
                Ok(json) => eprintln!("{json}"),
                Err(e) => tracing::warn!(error = %e, "Failed to render trace capture"),
            }
        }
        if self.options.save_traces {
            match capture.save(&self.options.trace_dir) {
                Ok(path) => tracing::debug!(path = %path.display(), "Trace capture saved"),
                Err(e) => tracing::warn!(
                    error = %e,
                    dir = %self.options.trace_dir.display(),
                    "Failed to save trace capture"
                ),
            }
        }
    }
}

impl Drop for InvocationSpan {
    fn drop(&mut self) {
        if !self.ended {
            tracing::debug!(span = %self.span_name, "Invocation abandoned before completion");
            self.finish(CaptureStatus::Cancelled);
        }
    }
}

/// Response stream that owns the invocation span.
pub struct ObservedStream<St> {
    inner: St,
    guard: InvocationSpan,
    done: bool,
}

impl<St> ObservedStream<St> {
    pub fn trace_id(&self) -> &str {
        &self.guard.trace_id
    }

    pub fn event_count(&self) -> usize {
        self.guard.response.event_count
    }
}

impl<St, Ev, E> Stream for ObservedStream<St>
where
    St: Stream<Item = Result<Ev, E>> + Unpin,
    Ev: StreamEvent,
    E: ErrorType,
{
    type Item = Result<Ev, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        let _attached = this.guard.context.clone().attach();
        match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
            Some(Ok(event)) => {
                this.guard.record_event(&event);
                Poll::Ready(Some(Ok(event)))
            }
            Some(Err(e)) => {
                this.done = true;
                this.guard.finish(error_status(&e));
                Poll::Ready(Some(Err(e)))
            }
            None => {
                this.done = true;
                this.guard.finish(CaptureStatus::Ok);
                Poll::Ready(None)
            }
        }
    }
}

impl<St, E> ObservedStream<St>
where
    St: Stream<Item = Result<AgentEvent, E>> + Unpin,
    E: ErrorType,
{
    /// Drain the stream inside the span and collect the response.
    pub async fn completion(mut self) -> Result<Completion, E> {
        let mut completion = Completion::default();
        while let Some(event) = self.next().await {
            completion.push(event?);
        }
        Ok(completion)
    }
}

impl<St> std::fmt::Debug for ObservedStream<St> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservedStream")
            .field("span_name", &self.guard.span_name)
            .field("events", &self.guard.response.event_count)
            .field("done", &self.done)
            .finish()
    }
}
