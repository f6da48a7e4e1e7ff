//! `inline-agent hello`: the smallest inline agent.

use anyhow::Result;
use futures::StreamExt;
use inline_agent_core::InlineAgentSpec;
use inline_agent_runtime::{AgentConfig, InlineAgent};

use super::backend;
use super::inline::ask_on_stdin;
use super::print_event;
use crate::output;

const INSTRUCTION: &str =
    "You are a friendly assistant that is supposed to say hello to everything.";
const PROMPT: &str = "Hi how are you? What can you do for me?";

pub async fn handle(model_id: String) -> Result<()> {
    let agent_config = AgentConfig::from_env()?;
    let backend = backend::connect(&agent_config).await?;

    let spec = InlineAgentSpec::new(model_id, INSTRUCTION)
        .with_agent_name("hello-world-agent")
        .with_trace(agent_config.enable_trace)
        .with_user_input(true);
    let agent = InlineAgent::new(backend.inline, spec).with_user_input_handler(ask_on_stdin);

    output::header("Running hello world agent");
    output::dim(PROMPT);

    let mut completion = String::new();
    let mut events = 0;
    let mut stream = agent.invoke_stream(PROMPT);
    while let Some(event) = stream.next().await {
        let event = event?;
        events += 1;
        if let Some(text) = print_event(&event) {
            completion.push_str(text);
        }
    }
    output::end_of_completion(&completion, events);
    Ok(())
}
