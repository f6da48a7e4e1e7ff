//! Agent runtime configuration loaded from the environment.

use inline_agent_core::InvokeRequest;
use inline_agent_observability::{ConfigError, EnvReader};

/// Settings for reaching Bedrock agents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub region: String,
    pub profile: Option<String>,
    pub agent_id: Option<String>,
    pub agent_alias_id: Option<String>,
    pub enable_trace: bool,
    pub stream_final_response: bool,
    pub foundation_model: Option<String>,
    /// Prompt used when the caller supplies none
    pub default_prompt: Option<String>,
}

impl AgentConfig {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            profile: None,
            agent_id: None,
            agent_alias_id: None,
            enable_trace: true,
            stream_final_response: false,
            foundation_model: None,
            default_prompt: None,
        }
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>, alias_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self.agent_alias_id = Some(alias_id.into());
        self
    }

    /// Reads:
    ///
    /// - `AWS_REGION` or `AWS_DEFAULT_REGION` (required)
    /// - `AWS_PROFILE`
    /// - `AGENT_ID`, `AGENT_ALIAS_ID`
    /// - `ENABLE_TRACE` (default on), `STREAM_FINAL_RESPONSE` (default off)
    /// - `FOUNDATION_MODEL`
    /// - `AGENT_PROMPT`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader::new(lookup);
        Ok(Self {
            region: env.required_any(&["AWS_REGION", "AWS_DEFAULT_REGION"])?,
            profile: env.optional("AWS_PROFILE"),
            agent_id: env.optional("AGENT_ID"),
            agent_alias_id: env.optional("AGENT_ALIAS_ID"),
            enable_trace: env.flag("ENABLE_TRACE", true)?,
            stream_final_response: env.flag("STREAM_FINAL_RESPONSE", false)?,
            foundation_model: env.optional("FOUNDATION_MODEL"),
            default_prompt: env.optional("AGENT_PROMPT"),
        })
    }

    /// Agent and alias ids, required by managed-agent invocation.
    pub fn managed_agent(&self) -> Result<(&str, &str), ConfigError> {
        let agent_id = self
            .agent_id
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVar("AGENT_ID".to_string()))?;
        let alias_id = self
            .agent_alias_id
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVar("AGENT_ALIAS_ID".to_string()))?;
        Ok((agent_id, alias_id))
    }

    /// Request for the managed agent with this config's trace and streaming
    /// settings.
    pub fn invoke_request(&self, input_text: impl Into<String>) -> Result<InvokeRequest, ConfigError> {
        let (agent_id, alias_id) = self.managed_agent()?;
        Ok(InvokeRequest::new(agent_id, alias_id, input_text)
            .with_trace(self.enable_trace)
            .with_stream_final_response(self.stream_final_response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_region_required() {
        let err = AgentConfig::from_lookup(lookup(&[("AGENT_ID", "A1")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingVar("AWS_REGION".to_string()));
    }

    #[test]
    fn test_full_config() {
        let config = AgentConfig::from_lookup(lookup(&[
            ("AWS_DEFAULT_REGION", "us-west-2"),
            ("AWS_PROFILE", "dev"),
            ("AGENT_ID", "AGENT1"),
            ("AGENT_ALIAS_ID", "ALIAS1"),
            ("ENABLE_TRACE", "false"),
            ("STREAM_FINAL_RESPONSE", "yes"),
            ("AGENT_PROMPT", "hello"),
        ]))
        .unwrap();

        assert_eq!(config.region, "us-west-2");
        assert_eq!(config.profile.as_deref(), Some("dev"));
        assert!(!config.enable_trace);
        assert!(config.stream_final_response);
        assert_eq!(config.default_prompt.as_deref(), Some("hello"));

        let request = config.invoke_request("hi").unwrap();
        assert_eq!(request.agent_id, "AGENT1");
        assert_eq!(request.agent_alias_id, "ALIAS1");
        assert!(!request.enable_trace);
        assert!(request.streaming.stream_final_response);
        assert!(request.session_id.starts_with("session-"));
    }

    #[test]
    fn test_invalid_flag() {
        let err = AgentConfig::from_lookup(lookup(&[
            ("AWS_REGION", "us-east-1"),
            ("ENABLE_TRACE", "maybe"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "ENABLE_TRACE"));
    }

    #[test]
    fn test_managed_agent_ids_required() {
        let config = AgentConfig::from_lookup(lookup(&[
            ("AWS_REGION", "us-east-1"),
            ("AGENT_ID", "AGENT1"),
        ]))
        .unwrap();
        assert_eq!(
            config.invoke_request("hi").unwrap_err(),
            ConfigError::MissingVar("AGENT_ALIAS_ID".to_string())
        );
        assert!(AgentConfig::new("us-east-1")
            .with_agent("A", "B")
            .managed_agent()
            .is_ok());
    }
}
