use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use inline_agent_core::ParameterType;
use serde_json::{Map, Value as JsonValue, json};

use crate::tools::{Tool, ToolResult};

type Handler = Arc<dyn Fn(JsonValue) -> BoxFuture<'static, ToolResult> + Send + Sync>;

/// A tool backed by an async closure.
///
/// ```
/// use inline_agent_core::ParameterType;
/// use inline_agent_toolbus::FunctionTool;
///
/// let tool = FunctionTool::new("get_weather", "Current weather for a city", |args| async move {
///     let city = args["city"].as_str().unwrap_or("nowhere").to_string();
///     Ok(serde_json::json!(format!("Sunny in {city}")))
/// })
/// .with_parameter("city", ParameterType::String, "City name", true);
/// ```
#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    description: String,
    properties: Map<String, JsonValue>,
    required: Vec<String>,
    handler: Handler,
}

impl FunctionTool {
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(JsonValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            properties: Map::new(),
            required: Vec::new(),
            handler: Arc::new(move |args| -> BoxFuture<'static, ToolResult> {
                Box::pin(handler(args))
            }),
        }
    }

    pub fn with_parameter(
        mut self,
        name: impl Into<String>,
        param_type: ParameterType,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        let name = name.into();
        self.properties.insert(
            name.clone(),
            json!({ "type": param_type.as_str(), "description": description.into() }),
        );
        if required && !self.required.contains(&name) {
            self.required.push(name);
        }
        self
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("parameters", &self.properties.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> JsonValue {
        json!({
            "type": "object",
            "properties": self.properties,
            "required": self.required,
        })
    }

    async fn execute(&self, args: JsonValue) -> ToolResult {
        (self.handler)(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_function_tool_schema_and_execute() {
        let tool = FunctionTool::new("add", "Add two numbers", |args| async move {
            let a = args["a"].as_i64().unwrap_or(0);
            let b = args["b"].as_i64().unwrap_or(0);
            Ok(json!(a + b))
        })
        .with_parameter("a", ParameterType::Integer, "First", true)
        .with_parameter("b", ParameterType::Integer, "Second", false);

        let schema = tool.parameters_schema();
        assert_eq!(schema["properties"]["a"]["type"], "integer");
        assert_eq!(schema["required"], json!(["a"]));
        assert_eq!(tool.execute(json!({"a": 2, "b": 3})).await.unwrap(), json!(5));
    }
}
