//! `inline-agent invoke`: one observed managed-agent invocation.

use anyhow::{Result, anyhow};
use futures::StreamExt;
use inline_agent_observability::Observer;
use inline_agent_runtime::AgentConfig;

use super::backend;
use super::print_event;
use super::telemetry::Telemetry;
use crate::cli::TraceArgs;
use crate::output;

pub async fn handle(
    prompt: Option<String>,
    session_id: Option<String>,
    traces: TraceArgs,
    no_stream: bool,
) -> Result<()> {
    let agent_config = AgentConfig::from_env()?;
    let prompt = prompt
        .or_else(|| agent_config.default_prompt.clone())
        .ok_or_else(|| anyhow!("No prompt given; pass --prompt or set AGENT_PROMPT"))?;

    let mut request = agent_config.invoke_request(prompt)?;
    if let Some(session_id) = session_id {
        request = request.with_session_id(session_id);
    }
    if no_stream {
        request = request.with_stream_final_response(false);
    }

    let telemetry = Telemetry::start(&traces)?;
    let result = run(&telemetry, &agent_config, request).await;
    telemetry.shutdown();
    result
}

async fn run(
    telemetry: &Telemetry,
    agent_config: &AgentConfig,
    request: inline_agent_core::InvokeRequest,
) -> Result<()> {
    let backend = backend::connect(agent_config).await?;
    let observer = Observer::from_providers(&telemetry.providers, &telemetry.config);

    output::verbose(&format!(
        "Invoking agent {} (alias {}) in session {}",
        request.agent_id, request.agent_alias_id, request.session_id
    ));

    let managed = backend.managed;
    let mut stream = observer
        .observe_stream(request, |request| managed.invoke_agent(request))
        .await?;

    let mut completion = String::new();
    while let Some(event) = stream.next().await {
        let event = event?;
        if let Some(text) = print_event(&event) {
            completion.push_str(text);
        }
    }
    output::end_of_completion(&completion, stream.event_count());
    output::verbose(&format!("trace id {}", stream.trace_id()));
    Ok(())
}
