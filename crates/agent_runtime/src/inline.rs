//! Inline agent with a local return-control loop.
//!
//! The agent may hand function invocations back instead of answering. Each
//! round, every invocation is dispatched to its action group and the results
//! are sent back as the next turn, until a round ends without handing back
//! control.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_stream::try_stream;
use futures::future::join_all;
use futures::stream::BoxStream;
use futures::StreamExt;
use inline_agent_core::{
    ActionGroupSpec, AgentEvent, BuiltinSignature, Completion, FunctionInvocation, FunctionResult,
    InlineAgentSpec, InlineTurn,
};
use inline_agent_toolbus::ActionGroup;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::error::{Result, RuntimeError};
use crate::invoker::InlineInvoker;

pub const DEFAULT_MAX_ROUNDS: u32 = 10;

type UserInputFuture = Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send>>;

/// Answers the agent's questions when the user-input builtin is enabled.
pub type UserInputHandler = Arc<dyn Fn(String) -> UserInputFuture + Send + Sync>;

pub struct InlineAgent {
    invoker: Arc<dyn InlineInvoker>,
    spec: InlineAgentSpec,
    action_groups: Vec<ActionGroup>,
    user_input: Option<UserInputHandler>,
    max_rounds: u32,
}

impl InlineAgent {
    pub fn new(invoker: Arc<dyn InlineInvoker>, spec: InlineAgentSpec) -> Self {
        Self {
            invoker,
            spec,
            action_groups: Vec::new(),
            user_input: None,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn with_action_group(mut self, group: ActionGroup) -> Self {
        self.action_groups.push(group);
        self
    }

    pub fn with_user_input_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        let handler: UserInputHandler =
            Arc::new(move |question| -> UserInputFuture { Box::pin(handler(question)) });
        self.user_input = Some(handler);
        self
    }

    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds.max(1);
        self
    }

    pub fn spec(&self) -> &InlineAgentSpec {
        &self.spec
    }

    pub fn action_groups(&self) -> &[ActionGroup] {
        &self.action_groups
    }

    /// Load the tools of every MCP-backed action group.
    pub async fn connect(&mut self) -> Result<usize> {
        let mut added = 0;
        for group in &mut self.action_groups {
            added += group.connect().await?;
        }
        info!(
            "Inline agent '{}' ready with {} action groups",
            self.spec.agent_name,
            self.action_groups.len()
        );
        Ok(added)
    }

    /// Shut down every MCP client. Never fails; problems are logged.
    pub async fn shutdown(&self) {
        for group in &self.action_groups {
            group.shutdown().await;
        }
    }

    /// Spec sent to the service: the configured groups plus the local ones.
    pub fn agent_spec(&self) -> InlineAgentSpec {
        let mut spec = self.spec.clone();
        for group in &self.action_groups {
            let group_spec: ActionGroupSpec = group.to_spec();
            if !spec.action_groups.iter().any(|g| g.name == group_spec.name) {
                spec.action_groups.push(group_spec);
            }
        }
        spec
    }

    /// Run the agent to completion and collect every event.
    pub async fn invoke(&self, input: impl Into<String>) -> Result<Completion> {
        let mut stream = self.invoke_stream(input);
        let mut completion = Completion::default();
        while let Some(event) = stream.next().await {
            completion.push(event?);
        }
        Ok(completion)
    }

    /// Events of all rounds, including the return-control hand-offs.
    pub fn invoke_stream(&self, input: impl Into<String>) -> BoxStream<'_, Result<AgentEvent>> {
        let input = input.into();
        Box::pin(try_stream! {
            let spec = self.agent_spec();
            let mut turn = InlineTurn::Input { text: input };
            let mut round = 0;

            loop {
                round += 1;
                if round > self.max_rounds {
                    Err::<(), _>(RuntimeError::TooManyRounds(self.max_rounds))?;
                }
                debug!("Inline agent round {}", round);

                let mut events = self.invoker.invoke_inline(&spec, turn).await?;
                let mut handed_back = None;
                while let Some(event) = events.next().await {
                    let event = event?;
                    if let AgentEvent::ReturnControl { invocation_id, invocations } = &event {
                        handed_back = Some((invocation_id.clone(), invocations.clone()));
                    }
                    yield event;
                }

                let Some((invocation_id, invocations)) = handed_back else {
                    break;
                };
                let results = join_all(invocations.iter().map(|inv| self.dispatch(inv))).await;
                turn = InlineTurn::Results { invocation_id, results };
            }
        })
    }

    /// Run one invocation. Failures become error results for the agent.
    async fn dispatch(&self, invocation: &FunctionInvocation) -> FunctionResult {
        if self.is_user_input(invocation) {
            return self.ask_user(invocation).await;
        }

        let Some(group) = self
            .action_groups
            .iter()
            .find(|g| g.name() == invocation.action_group)
        else {
            warn!("Agent requested unknown action group '{}'", invocation.action_group);
            return FunctionResult::error(
                invocation,
                format!("Unknown action group '{}'", invocation.action_group),
            );
        };

        match group
            .dispatch(&invocation.function, &invocation.parameters)
            .await
        {
            Ok(value) => FunctionResult::success(invocation, render(value)),
            Err(e) => {
                warn!(
                    "Function {}/{} failed: {}",
                    invocation.action_group, invocation.function, e
                );
                FunctionResult::error(invocation, e.to_string())
            }
        }
    }

    fn is_user_input(&self, invocation: &FunctionInvocation) -> bool {
        self.spec.user_input
            && invocation.action_group
                == ActionGroupSpec::builtin(BuiltinSignature::UserInput).name
    }

    async fn ask_user(&self, invocation: &FunctionInvocation) -> FunctionResult {
        let Some(handler) = &self.user_input else {
            return FunctionResult::error(invocation, "No user is available to answer");
        };
        let question = invocation
            .parameters
            .iter()
            .map(|(_, value)| value.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        match handler(question).await {
            Ok(answer) => FunctionResult::success(invocation, answer),
            Err(e) => FunctionResult::error(invocation, e.to_string()),
        }
    }
}

impl std::fmt::Debug for InlineAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineAgent")
            .field("agent_name", &self.spec.agent_name)
            .field("action_groups", &self.action_groups)
            .field("max_rounds", &self.max_rounds)
            .finish_non_exhaustive()
    }
}

/// Response body sent back to the agent
fn render(value: JsonValue) -> String {
    match value {
        JsonValue::String(text) => text,
        other => other.to_string(),
    }
}
