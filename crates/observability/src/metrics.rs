//! Invocation metrics.
//!
//! Counts invocations and failures per operation and records call latency
//! in milliseconds. Only built when a meter provider is configured.

use std::time::Duration;

use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;

use crate::attributes::OPERATION_NAME;

/// Invocation counters and latency histogram.
#[derive(Clone)]
pub struct InvocationMetrics {
    invocations: Counter<u64>,
    errors: Counter<u64>,
    duration: Histogram<f64>,
}

impl InvocationMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            invocations: meter
                .u64_counter("agent.invocations")
                .with_description("Agent invocations started")
                .build(),
            errors: meter
                .u64_counter("agent.invocation.errors")
                .with_description("Agent invocations that failed or were cancelled")
                .build(),
            duration: meter
                .f64_histogram("agent.invocation.duration")
                .with_description("End-to-end agent invocation latency")
                .with_unit("ms")
                .build(),
        }
    }

    pub fn record(&self, operation: &str, status: &str, elapsed: Duration) {
        let labels = [
            KeyValue::new(OPERATION_NAME, operation.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.invocations.add(1, &labels);
        if status != "ok" {
            self.errors.add(1, &labels);
        }
        self.duration.record(elapsed.as_secs_f64() * 1000.0, &labels);
    }
}

impl std::fmt::Debug for InvocationMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationMetrics").finish_non_exhaustive()
    }
}
