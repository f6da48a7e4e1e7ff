use serde::{Deserialize, Serialize};

/// Streaming behaviour requested from the agent runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingConfig {
    pub stream_final_response: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_guardrail_interval: Option<u32>,
}

/// One invocation of a managed agent.
///
/// Field names serialize in camelCase; the observability wrapper reads
/// `agentId`, `sessionId`, `inputText`, `userId` and `tags` from the
/// serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeRequest {
    pub agent_id: String,
    pub agent_alias_id: String,
    pub session_id: String,
    pub input_text: String,
    #[serde(default)]
    pub enable_trace: bool,
    #[serde(default)]
    pub end_session: bool,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl InvokeRequest {
    pub fn new(
        agent_id: impl Into<String>,
        agent_alias_id: impl Into<String>,
        input_text: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_alias_id: agent_alias_id.into(),
            session_id: new_session_id(),
            input_text: input_text.into(),
            enable_trace: false,
            end_session: false,
            streaming: StreamingConfig::default(),
            memory_id: None,
            user_id: None,
            tags: Vec::new(),
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_trace(mut self, enable: bool) -> Self {
        self.enable_trace = enable;
        self
    }

    pub fn with_stream_final_response(mut self, stream: bool) -> Self {
        self.streaming.stream_final_response = stream;
        self
    }

    pub fn with_guardrail_interval(mut self, interval: u32) -> Self {
        self.streaming.apply_guardrail_interval = Some(interval);
        self
    }

    pub fn with_end_session(mut self, end: bool) -> Self {
        self.end_session = end;
        self
    }

    pub fn with_memory_id(mut self, memory_id: impl Into<String>) -> Self {
        self.memory_id = Some(memory_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Fresh session identifier in the `session-<uuid>` form.
pub fn new_session_id() -> String {
    format!("session-{}", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_request_has_session() {
        let req = InvokeRequest::new("AGENT1", "ALIAS1", "hello");
        assert!(req.session_id.starts_with("session-"));
        assert_eq!(req.input_text, "hello");
        assert!(!req.enable_trace);
    }

    #[test]
    fn test_serializes_camel_case_keys() {
        let req = InvokeRequest::new("AGENT1", "ALIAS1", "hello")
            .with_session_id("abc-123")
            .with_stream_final_response(true)
            .with_user_id("multiagent-test")
            .with_tags(["bedrock-agent", "example"]);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["agentId"], "AGENT1");
        assert_eq!(json["sessionId"], "abc-123");
        assert_eq!(json["inputText"], "hello");
        assert_eq!(json["userId"], "multiagent-test");
        assert_eq!(json["streaming"]["streamFinalResponse"], true);
        assert_eq!(json["tags"][1], "example");
    }

    #[test]
    fn test_optional_fields_skipped() {
        let req = InvokeRequest::new("A", "B", "x");
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("memoryId"));
        assert!(!json.contains("tags"));
        assert!(!json.contains("applyGuardrailInterval"));
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(new_session_id(), new_session_id());
    }
}
