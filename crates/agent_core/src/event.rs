use serde::{Deserialize, Serialize};

/// One element of an agent's streamed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Chunk { text: String },

    Trace { trace: serde_json::Value },

    ReturnControl {
        invocation_id: String,
        invocations: Vec<FunctionInvocation>,
    },

    Files { names: Vec<String> },
}

impl AgentEvent {
    pub fn chunk(text: impl Into<String>) -> Self {
        AgentEvent::Chunk { text: text.into() }
    }

    pub fn trace(trace: serde_json::Value) -> Self {
        AgentEvent::Trace { trace }
    }

    pub fn return_control(
        invocation_id: impl Into<String>,
        invocations: Vec<FunctionInvocation>,
    ) -> Self {
        AgentEvent::ReturnControl {
            invocation_id: invocation_id.into(),
            invocations,
        }
    }

    pub fn files(names: Vec<String>) -> Self {
        AgentEvent::Files { names }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::Chunk { .. } => "chunk",
            AgentEvent::Trace { .. } => "trace",
            AgentEvent::ReturnControl { .. } => "return_control",
            AgentEvent::Files { .. } => "files",
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            AgentEvent::Chunk { text } => Some(text),
            _ => None,
        }
    }
}

/// A function call the agent handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInvocation {
    pub action_group: String,
    pub function: String,
    #[serde(default)]
    pub parameters: Vec<(String, String)>,
}

impl FunctionInvocation {
    pub fn new(action_group: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            action_group: action_group.into(),
            function: function.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((name.into(), value.into()));
        self
    }
}

/// Outcome of a [`FunctionInvocation`], sent back to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResult {
    pub action_group: String,
    pub function: String,
    pub body: String,
    pub is_error: bool,
}

impl FunctionResult {
    pub fn success(invocation: &FunctionInvocation, body: impl Into<String>) -> Self {
        Self {
            action_group: invocation.action_group.clone(),
            function: invocation.function.clone(),
            body: body.into(),
            is_error: false,
        }
    }

    pub fn error(invocation: &FunctionInvocation, message: impl Into<String>) -> Self {
        Self {
            action_group: invocation.action_group.clone(),
            function: invocation.function.clone(),
            body: message.into(),
            is_error: true,
        }
    }
}

/// Input of one inline-agent round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InlineTurn {
    Input { text: String },

    Results {
        invocation_id: String,
        results: Vec<FunctionResult>,
    },
}

/// A fully drained response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub events: Vec<AgentEvent>,
}

impl Completion {
    pub fn push(&mut self, event: AgentEvent) {
        if let Some(text) = event.text() {
            self.text.push_str(text);
        }
        self.events.push(event);
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn traces(&self) -> impl Iterator<Item = &serde_json::Value> {
        self.events.iter().filter_map(|e| match e {
            AgentEvent::Trace { trace } => Some(trace),
            _ => None,
        })
    }
}
