//! `inline-agent inline`: an agent defined per call, with MCP-backed action
//! groups, run through the return-control loop inside an invocation span.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use futures::StreamExt;
use inline_agent_core::InlineAgentSpec;
use inline_agent_observability::{ObserveOptions, Observer};
use inline_agent_runtime::{AgentConfig, InlineAgent, RuntimeError};
use inline_agent_toolbus::{ActionGroup, McpClient, McpServersConfig};
use serde_json::json;

use super::backend;
use super::print_event;
use super::telemetry::Telemetry;
use crate::cli::TraceArgs;
use crate::output;

pub struct InlineOptions {
    pub model: Option<String>,
    pub instruction: String,
    pub prompt: String,
    pub name: String,
    pub mcp_config: Option<PathBuf>,
    pub code_interpreter: bool,
    pub user_input: bool,
    pub max_rounds: Option<u32>,
    pub traces: TraceArgs,
}

pub async fn handle(options: InlineOptions) -> Result<()> {
    let agent_config = AgentConfig::from_env()?;
    let model = options
        .model
        .clone()
        .or_else(|| agent_config.foundation_model.clone())
        .ok_or_else(|| anyhow!("No model given; pass --model or set FOUNDATION_MODEL"))?;
    let servers = match &options.mcp_config {
        Some(path) => McpServersConfig::load(path)
            .with_context(|| format!("loading MCP servers from {}", path.display()))?,
        None => McpServersConfig::new(),
    };

    let telemetry = Telemetry::start(&options.traces)?;
    let result = match start_groups(&servers).await {
        Ok(groups) => {
            let spec = InlineAgentSpec::new(model, options.instruction.as_str())
                .with_agent_name(options.name.as_str())
                .with_trace(agent_config.enable_trace)
                .with_user_input(options.user_input);
            run(&telemetry, &agent_config, spec, groups, &options).await
        }
        Err(e) => Err(e),
    };
    telemetry.shutdown();
    result
}

/// One action group per MCP server. Servers already started are shut down
/// when a later one fails.
async fn start_groups(servers: &McpServersConfig) -> Result<Vec<ActionGroup>> {
    let mut groups: Vec<ActionGroup> = Vec::new();
    for server in &servers.servers {
        output::verbose(&format!("Starting MCP server {} ({})", server.id, server.transport_kind()));
        match McpClient::start(server).await {
            Ok(client) => groups.push(
                ActionGroup::new(
                    server.id.as_str(),
                    format!("Tools from {}", server.display_name()),
                )
                .with_mcp_client(client.into_shared()),
            ),
            Err(e) => {
                for group in &groups {
                    group.shutdown().await;
                }
                return Err(e).with_context(|| format!("starting MCP server '{}'", server.id));
            }
        }
    }
    Ok(groups)
}

async fn run(
    telemetry: &Telemetry,
    agent_config: &AgentConfig,
    spec: InlineAgentSpec,
    groups: Vec<ActionGroup>,
    options: &InlineOptions,
) -> Result<()> {
    let backend = match backend::connect(agent_config).await {
        Ok(backend) => backend,
        Err(e) => {
            for group in &groups {
                group.shutdown().await;
            }
            return Err(e);
        }
    };

    let mut agent = InlineAgent::new(backend.inline, spec);
    for group in groups {
        agent = agent.with_action_group(group);
    }
    if options.code_interpreter {
        agent = agent.with_action_group(ActionGroup::code_interpreter());
    }
    if options.user_input {
        agent = agent.with_user_input_handler(ask_on_stdin);
    }
    if let Some(rounds) = options.max_rounds {
        agent = agent.with_max_rounds(rounds);
    }

    let result = converse(telemetry, &mut agent, &options.prompt).await;
    agent.shutdown().await;
    result
}

async fn converse(telemetry: &Telemetry, agent: &mut InlineAgent, prompt: &str) -> Result<()> {
    let added = agent.connect().await?;
    output::verbose(&format!("{added} MCP tools loaded"));
    for group in agent.action_groups() {
        for tool in group.list_tools() {
            output::verbose(&format!("  {}/{}", group.name(), tool.name));
        }
    }

    let observer = Observer::from_providers(&telemetry.providers, &telemetry.config).with_options(
        ObserveOptions::from_config(&telemetry.config).with_operation("invoke_inline_agent"),
    );
    let spec = agent.spec();
    let args = json!({
        "sessionId": spec.session_id,
        "inputText": prompt,
        "foundationModel": spec.foundation_model,
    });

    let agent = &*agent;
    let mut stream = observer
        .observe_stream(args, |_| async move {
            Ok::<_, RuntimeError>(agent.invoke_stream(prompt))
        })
        .await?;

    let mut completion = String::new();
    while let Some(event) = stream.next().await {
        let event = event?;
        if let Some(text) = print_event(&event) {
            completion.push_str(text);
        }
    }
    output::end_of_completion(&completion, stream.event_count());
    Ok(())
}

/// Answer the agent's question from a line of stdin.
pub async fn ask_on_stdin(question: String) -> Result<String> {
    output::warning(&question);
    let answer = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await??;
    Ok(answer.trim().to_string())
}
