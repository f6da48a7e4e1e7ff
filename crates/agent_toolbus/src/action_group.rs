//! Action groups: named sets of functions an inline agent may call.
//!
//! Functions come from local [`Tool`]s or from the tools of MCP servers
//! (added by [`ActionGroup::connect`]). A group may instead stand for a
//! service builtin such as the code interpreter, in which case the service
//! runs it and nothing is dispatched locally.

use std::sync::Arc;
use std::time::Instant;

use inline_agent_core::{
    ActionGroupSpec, BuiltinSignature, FunctionSpec, ParameterSpec, ParameterType,
};
use inline_agent_observability::{record_duration, record_error, tool_span};
use serde_json::{Map, Value as JsonValue};
use tracing::{Instrument, debug, info, warn};

use crate::mcp::{McpTool, SharedMcpClient};
use crate::tools::{Tool, ToolError, ToolInfo};

pub struct ActionGroup {
    name: String,
    description: String,
    tools: Vec<Arc<dyn Tool>>,
    mcp_clients: Vec<SharedMcpClient>,
    builtin: Option<BuiltinSignature>,
    connected: bool,
}

impl ActionGroup {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tools: Vec::new(),
            mcp_clients: Vec::new(),
            builtin: None,
            connected: false,
        }
    }

    /// Group standing for a service builtin.
    pub fn builtin(signature: BuiltinSignature) -> Self {
        let spec = ActionGroupSpec::builtin(signature);
        let mut group = Self::new(spec.name, spec.description);
        group.builtin = Some(signature);
        group
    }

    pub fn code_interpreter() -> Self {
        Self::builtin(BuiltinSignature::CodeInterpreter)
    }

    pub fn with_tool<T: Tool + 'static>(mut self, tool: T) -> Result<Self, ToolError> {
        self.add_tool(Arc::new(tool))?;
        Ok(self)
    }

    pub fn with_mcp_client(mut self, client: SharedMcpClient) -> Self {
        self.mcp_clients.push(client);
        self.connected = false;
        self
    }

    /// Add a tool; names must be unique within the group.
    pub fn add_tool(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        if self.builtin.is_some() {
            return Err(ToolError::Builtin(self.name.clone()));
        }
        if self.find(tool.name()).is_some() {
            return Err(ToolError::Duplicate {
                group: self.name.clone(),
                function: tool.name().to_string(),
            });
        }
        self.tools.push(tool);
        Ok(())
    }

    /// List every MCP client's tools and add them to the group.
    ///
    /// Returns the number of tools added. Calling it again is a no-op until
    /// another client is attached.
    pub async fn connect(&mut self) -> Result<usize, ToolError> {
        if self.connected {
            return Ok(0);
        }

        let mut added = 0;
        for client in self.mcp_clients.clone() {
            let (server_id, tools) = {
                let mut guard = client.lock().await;
                if !guard.is_initialized() {
                    guard.initialize().await?;
                }
                (guard.server_id().to_string(), guard.list_tools().await?)
            };

            let known: Vec<String> = self
                .tools
                .iter()
                .map(|t| t.name().to_string())
                .collect();
            for definition in tools {
                if known.contains(&definition.name) {
                    // Already added by an earlier connect
                    continue;
                }
                debug!("[{}] Adding MCP tool {}/{}", self.name, server_id, definition.name);
                self.add_tool(Arc::new(McpTool::new(
                    server_id.clone(),
                    definition,
                    Arc::clone(&client),
                )))?;
                added += 1;
            }
        }

        self.connected = true;
        info!("Action group '{}' connected with {} functions", self.name, self.tools.len());
        Ok(added)
    }

    /// Shut every MCP client down. Failures are logged, not returned.
    pub async fn shutdown(&self) {
        for client in &self.mcp_clients {
            let mut guard = client.lock().await;
            if let Err(e) = guard.shutdown().await {
                warn!("Failed to shut down MCP server '{}': {}", guard.server_id(), e);
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_builtin(&self) -> bool {
        self.builtin.is_some()
    }

    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools.iter().map(|t| ToolInfo::of(t.as_ref())).collect()
    }

    fn find(&self, function: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == function)
    }

    /// Function descriptors derived from each tool's JSON Schema.
    pub fn function_definitions(&self) -> Vec<FunctionSpec> {
        self.tools
            .iter()
            .map(|tool| FunctionSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: parameter_specs(&tool.parameters_schema()),
            })
            .collect()
    }

    pub fn to_spec(&self) -> ActionGroupSpec {
        match self.builtin {
            Some(signature) => ActionGroupSpec::builtin(signature),
            None => ActionGroupSpec::functions(
                &self.name,
                &self.description,
                self.function_definitions(),
            ),
        }
    }

    /// Run `function` with string parameters coerced by its schema.
    pub async fn dispatch(
        &self,
        function: &str,
        parameters: &[(String, String)],
    ) -> Result<JsonValue, ToolError> {
        let tool = self.find(function).ok_or_else(|| ToolError::NotFound {
            group: self.name.clone(),
            function: function.to_string(),
        })?;

        let args = coerce_arguments(&tool.parameters_schema(), parameters)?;

        let span = tool_span!(self.name.as_str(), function);
        let start = Instant::now();
        let result = tool.execute(args).instrument(span.clone()).await;

        span.in_scope(|| {
            record_duration("duration_ms", start.elapsed());
            if let Err(e) = &result {
                record_error(e);
            }
        });

        result.map_err(|source| ToolError::Execution {
            function: function.to_string(),
            source,
        })
    }
}

impl std::fmt::Debug for ActionGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionGroup")
            .field("name", &self.name)
            .field(
                "tools",
                &self.tools.iter().map(|t| t.name().to_string()).collect::<Vec<_>>(),
            )
            .field("mcp_clients", &self.mcp_clients.len())
            .field("builtin", &self.builtin)
            .finish()
    }
}

fn schema_properties(schema: &JsonValue) -> Option<&Map<String, JsonValue>> {
    schema.get("properties").and_then(JsonValue::as_object)
}

fn schema_type(property: &JsonValue) -> ParameterType {
    let type_name = match property.get("type") {
        Some(JsonValue::String(t)) => t.as_str(),
        // ["integer", "null"] style unions: first non-null entry
        Some(JsonValue::Array(types)) => types
            .iter()
            .filter_map(JsonValue::as_str)
            .find(|t| *t != "null")
            .unwrap_or("string"),
        _ => "string",
    };
    ParameterType::from_schema_type(type_name)
}

/// Parameter descriptors for the `properties` of a JSON Schema object.
pub fn parameter_specs(schema: &JsonValue) -> Vec<ParameterSpec> {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(JsonValue::as_array)
        .map(|items| items.iter().filter_map(JsonValue::as_str).collect())
        .unwrap_or_default();

    schema_properties(schema)
        .map(|properties| {
            properties
                .iter()
                .map(|(name, property)| ParameterSpec {
                    name: name.clone(),
                    param_type: schema_type(property),
                    description: property
                        .get("description")
                        .and_then(JsonValue::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    required: required.contains(&name.as_str()),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Build a JSON arguments object from string parameters.
///
/// Integers, numbers and booleans are parsed; arrays and objects are read as
/// JSON; everything else, including parameters the schema does not
/// declare, stays a string.
pub fn coerce_arguments(
    schema: &JsonValue,
    parameters: &[(String, String)],
) -> Result<JsonValue, ToolError> {
    let properties = schema_properties(schema);
    let mut args = Map::new();

    for (name, raw) in parameters {
        let param_type = properties
            .and_then(|p| p.get(name))
            .map(schema_type)
            .unwrap_or(ParameterType::String);
        args.insert(name.clone(), coerce_value(name, raw, param_type)?);
    }

    Ok(JsonValue::Object(args))
}

fn coerce_value(name: &str, raw: &str, param_type: ParameterType) -> Result<JsonValue, ToolError> {
    let invalid = |reason: String| ToolError::InvalidArgument {
        name: name.to_string(),
        reason,
    };
    let trimmed = raw.trim();

    match param_type {
        ParameterType::Integer => trimmed
            .parse::<i64>()
            .map(JsonValue::from)
            .map_err(|_| invalid(format!("expected an integer, got '{raw}'"))),
        ParameterType::Number => trimmed
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            .ok_or_else(|| invalid(format!("expected a number, got '{raw}'"))),
        ParameterType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" => Ok(JsonValue::Bool(true)),
            "false" => Ok(JsonValue::Bool(false)),
            _ => Err(invalid(format!("expected true or false, got '{raw}'"))),
        },
        ParameterType::Array | ParameterType::Object => serde_json::from_str(trimmed)
            .map_err(|e| invalid(format!("expected JSON {}: {e}", param_type.as_str()))),
        ParameterType::String => Ok(JsonValue::String(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FunctionTool;
    use inline_agent_core::ActionGroupKind;
    use serde_json::json;

    fn echo_tool() -> FunctionTool {
        FunctionTool::new("echo", "Echo the arguments", |args| async move { Ok(args) })
            .with_parameter("count", ParameterType::Integer, "How many", true)
            .with_parameter("ratio", ParameterType::Number, "Scale", false)
            .with_parameter("loud", ParameterType::Boolean, "Shout", false)
            .with_parameter("items", ParameterType::Array, "List", false)
            .with_parameter("text", ParameterType::String, "Words", false)
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_dispatch_coerces_by_schema() {
        let group = ActionGroup::new("Utils", "Utility functions")
            .with_tool(echo_tool())
            .unwrap();

        let result = group
            .dispatch(
                "echo",
                &params(&[
                    ("count", " 3 "),
                    ("ratio", "0.5"),
                    ("loud", "TRUE"),
                    ("items", "[1, \"two\"]"),
                    ("text", "42"),
                    ("extra", "kept"),
                ]),
            )
            .await
            .unwrap();

        assert_eq!(
            result,
            json!({
                "count": 3,
                "ratio": 0.5,
                "loud": true,
                "items": [1, "two"],
                "text": "42",
                "extra": "kept",
            })
        );
    }

    #[tokio::test]
    async fn test_dispatch_unknown_function() {
        let group = ActionGroup::new("Utils", "").with_tool(echo_tool()).unwrap();
        let err = group.dispatch("missing", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            ToolError::NotFound { ref group, ref function } if group == "Utils" && function == "missing"
        ));
    }

    #[tokio::test]
    async fn test_dispatch_invalid_argument() {
        let group = ActionGroup::new("Utils", "").with_tool(echo_tool()).unwrap();
        let err = group
            .dispatch("echo", &params(&[("count", "many")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument { ref name, .. } if name == "count"));
    }

    #[tokio::test]
    async fn test_dispatch_tool_failure() {
        let failing = FunctionTool::new("fail", "Always fails", |_| async move {
            Err(anyhow::anyhow!("disk full"))
        });
        let group = ActionGroup::new("Utils", "").with_tool(failing).unwrap();
        let err = group.dispatch("fail", &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "Tool 'fail' failed: disk full");
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = ActionGroup::new("Utils", "")
            .with_tool(echo_tool())
            .unwrap()
            .with_tool(echo_tool())
            .unwrap_err();
        assert!(matches!(err, ToolError::Duplicate { .. }));
    }

    #[test]
    fn test_builtin_group() {
        let group = ActionGroup::code_interpreter();
        assert!(group.is_builtin());
        assert_eq!(group.name(), "CodeInterpreterAction");
        assert_eq!(
            group.to_spec().kind,
            ActionGroupKind::Builtin(BuiltinSignature::CodeInterpreter)
        );
        assert!(matches!(
            group.with_tool(echo_tool()),
            Err(ToolError::Builtin(_))
        ));
    }

    #[test]
    fn test_function_definitions() {
        let group = ActionGroup::new("Utils", "Utility functions")
            .with_tool(echo_tool())
            .unwrap();
        let spec = group.to_spec();
        assert_eq!(spec.name, "Utils");

        let ActionGroupKind::Functions(functions) = spec.kind else {
            panic!("expected functions");
        };
        assert_eq!(functions.len(), 1);
        let count = functions[0]
            .parameters
            .iter()
            .find(|p| p.name == "count")
            .unwrap();
        assert_eq!(count.param_type, ParameterType::Integer);
        assert_eq!(count.description, "How many");
        assert!(count.required);
    }

    #[test]
    fn test_parameter_specs_nullable_union() {
        let schema = json!({
            "type": "object",
            "properties": {"limit": {"type": ["integer", "null"]}},
        });
        let specs = parameter_specs(&schema);
        assert_eq!(specs[0].param_type, ParameterType::Integer);
        assert!(!specs[0].required);
        assert!(parameter_specs(&json!({})).is_empty());
    }
}
