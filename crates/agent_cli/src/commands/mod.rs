//! Command dispatch.

pub mod backend;
pub mod hello;
pub mod inline;
pub mod invoke;
pub mod mcp;
pub mod telemetry;
pub mod trace;

use anyhow::Result;
use inline_agent_core::AgentEvent;

use crate::cli::{Cli, Command};
use crate::output;

pub async fn handle(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Hello { model_id } => hello::handle(model_id).await,
        Command::Invoke {
            prompt,
            session_id,
            traces,
            no_stream,
        } => invoke::handle(prompt, session_id, traces, no_stream).await,
        Command::Inline {
            model,
            instruction,
            prompt,
            name,
            mcp_config,
            code_interpreter,
            user_input,
            max_rounds,
            traces,
        } => {
            let options = inline::InlineOptions {
                model,
                instruction,
                prompt,
                name,
                mcp_config,
                code_interpreter,
                user_input,
                max_rounds,
                traces,
            };
            inline::handle(options).await
        }
        Command::Mcp { action } => mcp::handle(action).await,
        Command::Trace { action } => trace::handle(action),
    }
}

/// Print one streamed event; returns the completion text it carried.
pub(crate) fn print_event(event: &AgentEvent) -> Option<&str> {
    match event {
        AgentEvent::Chunk { text } => {
            output::chunk(text);
            return Some(text);
        }
        AgentEvent::Trace { trace } => output::verbose(&format!("trace: {trace}")),
        AgentEvent::ReturnControl { invocations, .. } => {
            for invocation in invocations {
                output::verbose(&format!(
                    "→ {}/{} {:?}",
                    invocation.action_group, invocation.function, invocation.parameters
                ));
            }
        }
        AgentEvent::Files { names } => output::kv("Files:", &names.join(", ")),
    }
    None
}
