//! Tracer provider lifecycle for observed commands.

use std::time::Duration;

use anyhow::Result;
use inline_agent_observability::{
    ObservabilityConfig, TelemetryProviders, create_tracer_provider, init,
};

use crate::cli::TraceArgs;
use crate::output;

/// Export timeout for every OTLP exporter.
pub const EXPORT_TIMEOUT: Duration = Duration::from_secs(300);

pub struct Telemetry {
    pub config: ObservabilityConfig,
    pub providers: TelemetryProviders,
}

impl Telemetry {
    /// Fails fast when the OTLP settings are missing or invalid.
    pub fn start(traces: &TraceArgs) -> Result<Self> {
        let config = apply_trace_args(ObservabilityConfig::from_env()?, traces);
        let providers = create_tracer_provider(&config, EXPORT_TIMEOUT)?;
        if let Err(e) = init(&config, &providers) {
            output::warning(&format!("Log bridge not installed: {e}"));
        }
        output::verbose(&format!(
            "Exporting to {} as {}",
            config.otlp_endpoint, config.service_name
        ));
        Ok(Self { config, providers })
    }

    /// Flush and stop the providers; failures are reported, never raised.
    pub fn shutdown(&self) {
        if let Err(e) = self.providers.shutdown() {
            output::warning(&format!("Telemetry shutdown failed: {e}"));
        }
    }
}

/// Command-line flags win over the environment.
pub fn apply_trace_args(mut config: ObservabilityConfig, traces: &TraceArgs) -> ObservabilityConfig {
    if traces.show_traces {
        config = config.with_show_traces(true);
    }
    if traces.save_traces {
        config = config.with_save_traces(true);
    }
    if let Some(dir) = &traces.trace_dir {
        config = config.with_trace_dir(dir.clone());
    }
    config
}
