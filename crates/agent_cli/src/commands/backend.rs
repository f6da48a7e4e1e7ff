//! Agent backend selection.

use std::sync::Arc;

use anyhow::Result;
use inline_agent_runtime::{AgentConfig, AgentInvoker, InlineInvoker};

/// Invokers for managed and inline agents.
pub struct Backend {
    pub managed: Arc<dyn AgentInvoker>,
    pub inline: Arc<dyn InlineInvoker>,
}

#[cfg(feature = "bedrock")]
pub async fn connect(config: &AgentConfig) -> Result<Backend> {
    let client = Arc::new(inline_agent_runtime::BedrockAgentClient::new(config).await);
    Ok(Backend {
        managed: client.clone(),
        inline: client,
    })
}

#[cfg(not(feature = "bedrock"))]
pub async fn connect(config: &AgentConfig) -> Result<Backend> {
    Err(inline_agent_runtime::RuntimeError::Unavailable(format!(
        "this build has no Bedrock support (region {}); rebuild with `--features bedrock`",
        config.region
    ))
    .into())
}
