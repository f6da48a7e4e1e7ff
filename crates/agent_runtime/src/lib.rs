//! Agent invocation runtime.
//!
//! Backends implement [`AgentInvoker`] (managed agents) and
//! [`InlineInvoker`] (agents defined per call). [`InlineAgent`] drives the
//! return-control loop against local action groups. The Bedrock backend is
//! behind the `bedrock` feature.

#[cfg(feature = "bedrock")]
pub mod bedrock;
pub mod config;
pub mod error;
pub mod inline;
pub mod invoker;

#[cfg(feature = "bedrock")]
pub use bedrock::BedrockAgentClient;
pub use config::AgentConfig;
pub use error::{Result, RuntimeError};
pub use inline::{InlineAgent, UserInputHandler, DEFAULT_MAX_ROUNDS};
pub use invoker::{
    collect, event_stream, with_idle_timeout, AgentEventStream, AgentInvoker, ChunkDecoder,
    InlineInvoker,
};
