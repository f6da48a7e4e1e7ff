//! Inline agent definitions.
//!
//! An inline agent is declared per invocation: model, instruction and the
//! action groups it may call. Nothing here talks to the runtime; the
//! runtime crate translates these descriptors into service calls.

use serde::{Deserialize, Serialize};

use crate::request::new_session_id;

/// Parameter types an action-group function can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParameterType {
    /// Maps a JSON Schema `type` keyword; unknown types fall back to string.
    pub fn from_schema_type(value: &str) -> Self {
        match value {
            "integer" => ParameterType::Integer,
            "number" => ParameterType::Number,
            "boolean" => ParameterType::Boolean,
            "array" => ParameterType::Array,
            "object" => ParameterType::Object,
            _ => ParameterType::String,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Integer => "integer",
            ParameterType::Number => "number",
            ParameterType::Boolean => "boolean",
            ParameterType::Array => "array",
            ParameterType::Object => "object",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
}

/// Service-provided action groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuiltinSignature {
    #[serde(rename = "AMAZON.CodeInterpreter")]
    CodeInterpreter,
    #[serde(rename = "AMAZON.UserInput")]
    UserInput,
}

impl BuiltinSignature {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltinSignature::CodeInterpreter => "AMAZON.CodeInterpreter",
            BuiltinSignature::UserInput => "AMAZON.UserInput",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionGroupKind {
    Functions(Vec<FunctionSpec>),
    Builtin(BuiltinSignature),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionGroupSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: ActionGroupKind,
}

impl ActionGroupSpec {
    pub fn functions(
        name: impl Into<String>,
        description: impl Into<String>,
        functions: Vec<FunctionSpec>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind: ActionGroupKind::Functions(functions),
        }
    }

    pub fn builtin(signature: BuiltinSignature) -> Self {
        let name = match signature {
            BuiltinSignature::CodeInterpreter => "CodeInterpreterAction",
            BuiltinSignature::UserInput => "UserInputAction",
        };
        Self {
            name: name.to_string(),
            description: String::new(),
            kind: ActionGroupKind::Builtin(signature),
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.kind, ActionGroupKind::Builtin(_))
    }
}

/// Full description of an inline agent for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineAgentSpec {
    pub foundation_model: String,
    pub instruction: String,
    pub agent_name: String,
    pub session_id: String,
    #[serde(default)]
    pub enable_trace: bool,
    #[serde(default)]
    pub user_input: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_session_ttl_secs: Option<u32>,
    #[serde(default)]
    pub action_groups: Vec<ActionGroupSpec>,
}

impl InlineAgentSpec {
    pub fn new(foundation_model: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            foundation_model: foundation_model.into(),
            instruction: instruction.into(),
            agent_name: "InlineAgent".to_string(),
            session_id: new_session_id(),
            enable_trace: false,
            user_input: false,
            idle_session_ttl_secs: None,
            action_groups: Vec::new(),
        }
    }

    pub fn with_agent_name(mut self, name: impl Into<String>) -> Self {
        self.agent_name = name.into();
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_trace(mut self, enable: bool) -> Self {
        self.enable_trace = enable;
        self
    }

    pub fn with_user_input(mut self, enable: bool) -> Self {
        self.user_input = enable;
        self
    }

    pub fn with_idle_session_ttl(mut self, secs: u32) -> Self {
        self.idle_session_ttl_secs = Some(secs);
        self
    }

    pub fn with_action_group(mut self, group: ActionGroupSpec) -> Self {
        self.action_groups.push(group);
        self
    }

    /// Action groups as sent to the runtime, including the user-input
    /// builtin when enabled.
    pub fn effective_action_groups(&self) -> Vec<ActionGroupSpec> {
        let mut groups = self.action_groups.clone();
        let has_user_input = groups
            .iter()
            .any(|g| g.kind == ActionGroupKind::Builtin(BuiltinSignature::UserInput));
        if self.user_input && !has_user_input {
            groups.push(ActionGroupSpec::builtin(BuiltinSignature::UserInput));
        }
        groups
    }
}
