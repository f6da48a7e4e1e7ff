//! Amazon Bedrock Agents backend.
//!
//! Credentials come from the standard AWS chain (environment, shared
//! config and profiles, IMDS). Both managed and inline invocations stream
//! their response; SDK stream events are mapped to [`AgentEvent`]s.

use std::collections::HashMap;

use async_stream::try_stream;
use async_trait::async_trait;
use aws_sdk_bedrockagentruntime::error::DisplayErrorContext;
use aws_sdk_bedrockagentruntime::primitives::Blob;
use aws_sdk_bedrockagentruntime::types::{
    ActionGroupExecutor, ActionGroupSignature, AgentActionGroup, ContentBody, CustomControlMethod,
    FunctionDefinition, FunctionSchema, InlineAgentResponseStream, InlineSessionState,
    InvocationInputMember, InvocationResultMember, ParameterDetail, ResponseState, ResponseStream,
    StreamingConfigurations,
};
use inline_agent_core::{
    ActionGroupKind, ActionGroupSpec, AgentError, AgentEvent, FunctionInvocation, FunctionResult,
    FunctionSpec, InlineAgentSpec, InlineTurn, InvokeRequest, ParameterType,
};
use tracing::{debug, info};

use crate::config::AgentConfig;
use crate::invoker::{event_stream, AgentEventStream, AgentInvoker, ChunkDecoder, InlineInvoker};

/// Bedrock Agents runtime client for managed and inline agents.
///
/// ```rust,ignore
/// use inline_agent_runtime::{AgentConfig, BedrockAgentClient};
///
/// let config = AgentConfig::from_env()?;
/// let client = BedrockAgentClient::new(&config).await;
/// ```
#[derive(Debug, Clone)]
pub struct BedrockAgentClient {
    client: aws_sdk_bedrockagentruntime::Client,
    region: String,
}

impl BedrockAgentClient {
    pub async fn new(config: &AgentConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        let sdk_config = loader.load().await;

        info!("bedrock agent client created for region={}", config.region);
        Self {
            client: aws_sdk_bedrockagentruntime::Client::new(&sdk_config),
            region: config.region.clone(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

#[async_trait]
impl AgentInvoker for BedrockAgentClient {
    async fn invoke_agent(&self, request: InvokeRequest) -> Result<AgentEventStream, AgentError> {
        debug!(
            "bedrock invoke_agent agent={} session={}",
            request.agent_id, request.session_id
        );

        let streaming = StreamingConfigurations::builder()
            .stream_final_response(request.streaming.stream_final_response)
            .set_apply_guardrail_interval(
                request.streaming.apply_guardrail_interval.map(|i| i as i32),
            )
            .build();

        let output = self
            .client
            .invoke_agent()
            .agent_id(&request.agent_id)
            .agent_alias_id(&request.agent_alias_id)
            .session_id(&request.session_id)
            .input_text(&request.input_text)
            .enable_trace(request.enable_trace)
            .end_session(request.end_session)
            .set_memory_id(request.memory_id.clone())
            .streaming_configurations(streaming)
            .send()
            .await
            .map_err(|e| {
                AgentError::Invocation(format!(
                    "Bedrock invoke_agent failed in region={}: {}",
                    self.region,
                    DisplayErrorContext(&e)
                ))
            })?;

        let mut completion = output.completion;
        let stream = try_stream! {
            let mut decoder = ChunkDecoder::default();
            while let Some(event) = completion
                .recv()
                .await
                .map_err(|e| AgentError::Stream(DisplayErrorContext(&e).to_string()))?
            {
                let converted = match event {
                    ResponseStream::Chunk(part) => chunk_event(&mut decoder, part.bytes()),
                    ResponseStream::Trace(part) => Some(trace_event(&part.trace())),
                    ResponseStream::ReturnControl(payload) => {
                        Some(return_control_event(payload.invocation_id(), payload.invocation_inputs()))
                    }
                    ResponseStream::Files(part) => Some(AgentEvent::files(
                        part.files()
                            .iter()
                            .filter_map(|f| f.name().map(str::to_string))
                            .collect(),
                    )),
                    _ => None,
                };
                if let Some(event) = converted {
                    yield event;
                }
            }
            if let Some(tail) = decoder.finish() {
                yield AgentEvent::chunk(tail);
            }
        };
        Ok(event_stream(stream))
    }
}

#[async_trait]
impl InlineInvoker for BedrockAgentClient {
    async fn invoke_inline(
        &self,
        spec: &InlineAgentSpec,
        turn: InlineTurn,
    ) -> Result<AgentEventStream, AgentError> {
        debug!(
            "bedrock invoke_inline_agent model={} session={}",
            spec.foundation_model, spec.session_id
        );

        let action_groups = spec
            .effective_action_groups()
            .iter()
            .map(action_group)
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = self
            .client
            .invoke_inline_agent()
            .foundation_model(&spec.foundation_model)
            .instruction(&spec.instruction)
            .session_id(&spec.session_id)
            .enable_trace(spec.enable_trace)
            .set_idle_session_ttl_in_seconds(spec.idle_session_ttl_secs.map(|s| s as i32))
            .set_action_groups(Some(action_groups));

        builder = match turn {
            InlineTurn::Input { text } => builder.input_text(text),
            InlineTurn::Results {
                invocation_id,
                results,
            } => {
                let results = results
                    .iter()
                    .map(function_result)
                    .collect::<Result<Vec<_>, _>>()?;
                builder.inline_session_state(
                    InlineSessionState::builder()
                        .invocation_id(invocation_id)
                        .set_return_control_invocation_results(Some(results))
                        .build(),
                )
            }
        };

        let output = builder.send().await.map_err(|e| {
            AgentError::Invocation(format!(
                "Bedrock invoke_inline_agent failed in region={}: {}",
                self.region,
                DisplayErrorContext(&e)
            ))
        })?;

        let mut completion = output.completion;
        let stream = try_stream! {
            let mut decoder = ChunkDecoder::default();
            while let Some(event) = completion
                .recv()
                .await
                .map_err(|e| AgentError::Stream(DisplayErrorContext(&e).to_string()))?
            {
                let converted = match event {
                    InlineAgentResponseStream::Chunk(part) => chunk_event(&mut decoder, part.bytes()),
                    InlineAgentResponseStream::Trace(part) => Some(trace_event(&part.trace())),
                    InlineAgentResponseStream::ReturnControl(payload) => {
                        Some(return_control_event(payload.invocation_id(), payload.invocation_inputs()))
                    }
                    InlineAgentResponseStream::Files(part) => Some(AgentEvent::files(
                        part.files()
                            .iter()
                            .filter_map(|f| f.name().map(str::to_string))
                            .collect(),
                    )),
                    _ => None,
                };
                if let Some(event) = converted {
                    yield event;
                }
            }
            if let Some(tail) = decoder.finish() {
                yield AgentEvent::chunk(tail);
            }
        };
        Ok(event_stream(stream))
    }
}

fn chunk_event(decoder: &mut ChunkDecoder, bytes: Option<&Blob>) -> Option<AgentEvent> {
    decoder.push(bytes?.as_ref()).map(AgentEvent::chunk)
}

/// SDK trace types are not serde types; keep their debug rendering.
fn trace_event<T: std::fmt::Debug>(trace: &T) -> AgentEvent {
    AgentEvent::trace(serde_json::json!({ "debug": format!("{trace:?}") }))
}

fn return_control_event(invocation_id: Option<&str>, inputs: &[InvocationInputMember]) -> AgentEvent {
    let invocations = inputs
        .iter()
        .filter_map(|input| match input {
            InvocationInputMember::FunctionInvocationInput(call) => {
                let mut invocation =
                    FunctionInvocation::new(call.action_group(), call.function().unwrap_or_default());
                for parameter in call.parameters() {
                    if let (Some(name), Some(value)) = (parameter.name(), parameter.value()) {
                        invocation = invocation.with_parameter(name, value);
                    }
                }
                Some(invocation)
            }
            _ => None,
        })
        .collect();
    AgentEvent::return_control(invocation_id.unwrap_or_default(), invocations)
}

fn build_error(e: impl std::fmt::Display) -> AgentError {
    AgentError::Invocation(format!("invalid Bedrock request: {e}"))
}

fn sdk_parameter_type(param_type: ParameterType) -> aws_sdk_bedrockagentruntime::types::ParameterType {
    use aws_sdk_bedrockagentruntime::types::ParameterType as Sdk;
    match param_type {
        ParameterType::Integer => Sdk::Integer,
        ParameterType::Number => Sdk::Number,
        ParameterType::Boolean => Sdk::Boolean,
        ParameterType::Array => Sdk::Array,
        // Objects travel as JSON text
        ParameterType::String | ParameterType::Object => Sdk::String,
    }
}

fn function_definition(function: &FunctionSpec) -> Result<FunctionDefinition, AgentError> {
    let mut parameters = HashMap::new();
    for parameter in &function.parameters {
        let detail = ParameterDetail::builder()
            .r#type(sdk_parameter_type(parameter.param_type))
            .description(&parameter.description)
            .required(parameter.required)
            .build()
            .map_err(build_error)?;
        parameters.insert(parameter.name.clone(), detail);
    }

    FunctionDefinition::builder()
        .name(&function.name)
        .description(&function.description)
        .set_parameters(Some(parameters))
        .build()
        .map_err(build_error)
}

fn action_group(spec: &ActionGroupSpec) -> Result<AgentActionGroup, AgentError> {
    let mut builder = AgentActionGroup::builder().action_group_name(&spec.name);
    if !spec.description.is_empty() {
        builder = builder.description(&spec.description);
    }

    builder = match &spec.kind {
        ActionGroupKind::Builtin(signature) => {
            builder.parent_action_group_signature(ActionGroupSignature::from(signature.as_str()))
        }
        ActionGroupKind::Functions(functions) => {
            let definitions = functions
                .iter()
                .map(function_definition)
                .collect::<Result<Vec<_>, _>>()?;
            builder
                .action_group_executor(ActionGroupExecutor::CustomControl(
                    CustomControlMethod::ReturnControl,
                ))
                .function_schema(FunctionSchema::Functions(definitions))
        }
    };

    builder.build().map_err(build_error)
}

fn function_result(result: &FunctionResult) -> Result<InvocationResultMember, AgentError> {
    let mut builder = aws_sdk_bedrockagentruntime::types::FunctionResult::builder()
        .action_group(&result.action_group)
        .function(&result.function)
        .response_body("TEXT", ContentBody::builder().body(&result.body).build());
    if result.is_error {
        builder = builder.response_state(ResponseState::Failure);
    }
    Ok(InvocationResultMember::FunctionResult(
        builder.build().map_err(build_error)?,
    ))
}
