pub mod agent;
pub mod error;
pub mod event;
pub mod request;

pub use agent::{
    ActionGroupKind, ActionGroupSpec, BuiltinSignature, FunctionSpec, InlineAgentSpec,
    ParameterSpec, ParameterType,
};
pub use error::{AgentError, Result};
pub use event::{AgentEvent, Completion, FunctionInvocation, FunctionResult, InlineTurn};
pub use request::{InvokeRequest, StreamingConfig, new_session_id};
