//! Span attribute keys and request attribute extraction.
//!
//! Dashboards and alerts query these keys verbatim; do not rename them.

use opentelemetry::KeyValue;
use serde::Serialize;
use serde_json::{Map, Value};

pub const OPERATION_NAME: &str = "gen_ai.operation.name";
pub const SYSTEM: &str = "gen_ai.system";
pub const SESSION_ID: &str = "session.id";
pub const PROMPT: &str = "gen_ai.prompt";
pub const REQUEST_MODEL: &str = "gen_ai.request.model";
pub const AGENT_ID: &str = "gen_ai.agent.id";
pub const USER_ID: &str = "user.id";
pub const TAGS: &str = "tags";
pub const ERROR_TYPE: &str = "error.type";
pub const ERROR_MESSAGE: &str = "error.message";
pub const RESPONSE_KIND: &str = "response.kind";
pub const RESPONSE_EVENT_COUNT: &str = "response.event_count";
pub const COMPLETION: &str = "gen_ai.completion";

/// Value of [`SYSTEM`] on every invocation span
pub const SYSTEM_BEDROCK: &str = "aws.bedrock";

/// Operation recorded when none is configured
pub const DEFAULT_OPERATION: &str = "invoke_agent";

/// `error.type` of an invocation abandoned before it settled
pub const CANCELLED: &str = "Cancelled";

/// Request attributes read from the serialized arguments of a call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationAttributes {
    pub agent_id: Option<String>,
    pub session_id: Option<String>,
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub user_id: Option<String>,
    pub tags: Vec<String>,
}

impl InvocationAttributes {
    /// Reads fixed key names (camelCase or snake_case) from `args` serialized
    /// as a JSON object. Anything else yields no attributes.
    pub fn from_args<A: Serialize + ?Sized>(args: &A) -> Self {
        match serde_json::to_value(args) {
            Ok(Value::Object(map)) => Self::from_map(&map),
            _ => Self::default(),
        }
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        let tags = map
            .get("tags")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(scalar).collect())
            .unwrap_or_default();

        Self {
            agent_id: pick(map, &["agentId", "agent_id"]),
            session_id: pick(map, &["sessionId", "session_id"]),
            prompt: pick(map, &["inputText", "input_text"]),
            model: pick(map, &["foundationModel", "modelId", "model_id", "foundation_model"]),
            user_id: pick(map, &["userId", "user_id"]),
            tags,
        }
    }

    /// `"<operation> <agent id>"`, or the bare operation without an agent id.
    pub fn span_name(&self, operation: &str) -> String {
        match &self.agent_id {
            Some(agent_id) => format!("{operation} {agent_id}"),
            None => operation.to_string(),
        }
    }

    /// Attributes set when the span starts.
    pub fn key_values(&self, operation: &str) -> Vec<KeyValue> {
        let mut attributes = vec![
            KeyValue::new(OPERATION_NAME, operation.to_string()),
            KeyValue::new(SYSTEM, SYSTEM_BEDROCK),
        ];
        let optional = [
            (SESSION_ID, &self.session_id),
            (PROMPT, &self.prompt),
            (REQUEST_MODEL, &self.model),
            (AGENT_ID, &self.agent_id),
            (USER_ID, &self.user_id),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                attributes.push(KeyValue::new(key, value.clone()));
            }
        }
        if !self.tags.is_empty() {
            attributes.push(KeyValue::new(TAGS, self.tags.join(",")));
        }
        attributes
    }
}

fn pick(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| map.get(*key).and_then(scalar))
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
