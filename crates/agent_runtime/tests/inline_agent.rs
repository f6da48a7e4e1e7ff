use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::{stream, StreamExt};
use inline_agent_core::{
    ActionGroupKind, AgentError, AgentEvent, FunctionInvocation, InlineAgentSpec, InlineTurn,
    ParameterType,
};
use inline_agent_observability::attributes::{RESPONSE_EVENT_COUNT, RESPONSE_KIND};
use inline_agent_observability::{ObserveOptions, Observer};
use inline_agent_runtime::{
    event_stream, AgentEventStream, InlineAgent, InlineInvoker, RuntimeError,
};
use inline_agent_toolbus::{ActionGroup, FunctionTool};
use opentelemetry::trace::{Status, TracerProvider};
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};
use serde_json::json;

/// Replays one canned response per round and records every call.
#[derive(Default)]
struct ScriptedInvoker {
    rounds: Mutex<VecDeque<Vec<AgentEvent>>>,
    turns: Mutex<Vec<InlineTurn>>,
    specs: Mutex<Vec<InlineAgentSpec>>,
}

impl ScriptedInvoker {
    fn new(rounds: Vec<Vec<AgentEvent>>) -> Arc<Self> {
        Arc::new(Self {
            rounds: Mutex::new(rounds.into()),
            ..Default::default()
        })
    }

    fn turns(&self) -> Vec<InlineTurn> {
        self.turns.lock().unwrap().clone()
    }
}

#[async_trait]
impl InlineInvoker for ScriptedInvoker {
    async fn invoke_inline(
        &self,
        spec: &InlineAgentSpec,
        turn: InlineTurn,
    ) -> Result<AgentEventStream, AgentError> {
        self.specs.lock().unwrap().push(spec.clone());
        self.turns.lock().unwrap().push(turn);
        let events = self
            .rounds
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::Invocation("script exhausted".to_string()))?;
        Ok(event_stream(stream::iter(events.into_iter().map(Ok))))
    }
}

fn spec() -> InlineAgentSpec {
    InlineAgentSpec::new("anthropic.claude-3-haiku", "You tell the time.")
        .with_agent_name("clock")
        .with_session_id("sess-1")
}

fn clock_group() -> ActionGroup {
    ActionGroup::new("clock", "Time tools")
        .with_tool(
            FunctionTool::new("now", "Current time in a timezone", |args| async move {
                let tz = args["tz"].as_str().unwrap_or("UTC").to_string();
                if tz == "Mars/Olympus" {
                    anyhow::bail!("unknown timezone {tz}");
                }
                Ok(json!(format!("12:00 {tz}")))
            })
            .with_parameter("tz", ParameterType::String, "IANA timezone", true),
        )
        .unwrap()
        .with_tool(
            FunctionTool::new("offset", "Offset in hours", |args| async move {
                Ok(json!({ "hours": args["hours"].as_i64().unwrap_or(0) * 2 }))
            })
            .with_parameter("hours", ParameterType::Integer, "Hours", true),
        )
        .unwrap()
}

fn hand_back(invocations: Vec<FunctionInvocation>) -> AgentEvent {
    AgentEvent::return_control("inv-1", invocations)
}

#[tokio::test]
async fn test_return_control_round_trip() {
    let invoker = ScriptedInvoker::new(vec![
        vec![hand_back(vec![
            FunctionInvocation::new("clock", "now").with_parameter("tz", "UTC"),
            FunctionInvocation::new("clock", "offset").with_parameter("hours", "3"),
        ])],
        vec![AgentEvent::chunk("It is "), AgentEvent::chunk("noon.")],
    ]);
    let agent = InlineAgent::new(invoker.clone(), spec()).with_action_group(clock_group());

    let completion = agent.invoke("What time is it?").await.unwrap();
    assert_eq!(completion.text, "It is noon.");
    assert_eq!(completion.event_count(), 3);

    let turns = invoker.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(
        turns[0],
        InlineTurn::Input {
            text: "What time is it?".to_string()
        }
    );
    let InlineTurn::Results {
        invocation_id,
        results,
    } = &turns[1]
    else {
        panic!("second turn should carry results");
    };
    assert_eq!(invocation_id, "inv-1");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].body, "12:00 UTC");
    assert!(!results[0].is_error);
    assert_eq!(results[1].body, r#"{"hours":6}"#);

    // The local group is advertised next to the configured ones
    let specs = invoker.specs.lock().unwrap();
    let group = specs[0]
        .action_groups
        .iter()
        .find(|g| g.name == "clock")
        .unwrap();
    let ActionGroupKind::Functions(functions) = &group.kind else {
        panic!("clock should be a function group");
    };
    assert_eq!(functions.len(), 2);
}

#[tokio::test]
async fn test_failures_are_returned_to_the_agent() {
    let invoker = ScriptedInvoker::new(vec![
        vec![hand_back(vec![
            FunctionInvocation::new("clock", "now").with_parameter("tz", "Mars/Olympus"),
            FunctionInvocation::new("clock", "offset").with_parameter("hours", "three"),
            FunctionInvocation::new("calendar", "today"),
            FunctionInvocation::new("clock", "sundial"),
        ])],
        vec![AgentEvent::chunk("Sorry.")],
    ]);
    let agent = InlineAgent::new(invoker.clone(), spec()).with_action_group(clock_group());

    let completion = agent.invoke("time on Mars?").await.unwrap();
    assert_eq!(completion.text, "Sorry.");

    let turns = invoker.turns();
    let InlineTurn::Results { results, .. } = &turns[1] else {
        panic!("second turn should carry results");
    };
    assert!(results.iter().all(|r| r.is_error));
    assert!(results[0].body.contains("unknown timezone Mars/Olympus"));
    assert!(results[1].body.contains("hours"));
    assert_eq!(results[2].body, "Unknown action group 'calendar'");
    assert!(results[3].body.contains("sundial"));
}

#[tokio::test]
async fn test_round_limit() {
    let rounds = (0..3)
        .map(|_| vec![hand_back(vec![FunctionInvocation::new("clock", "now")])])
        .collect();
    let invoker = ScriptedInvoker::new(rounds);
    let agent = InlineAgent::new(invoker.clone(), spec())
        .with_action_group(clock_group())
        .with_max_rounds(2);

    let err = agent.invoke("loop forever").await.unwrap_err();
    assert!(matches!(err, RuntimeError::TooManyRounds(2)));
    assert_eq!(invoker.turns().len(), 2);
}

#[tokio::test]
async fn test_invoker_error_ends_stream() {
    let invoker = ScriptedInvoker::new(vec![]);
    let agent = InlineAgent::new(invoker, spec());

    let err = agent.invoke("hello").await.unwrap_err();
    assert!(matches!(err, RuntimeError::Agent(AgentError::Invocation(_))));
}

#[tokio::test]
async fn test_user_input_handler_answers() {
    let invoker = ScriptedInvoker::new(vec![
        vec![hand_back(vec![FunctionInvocation::new(
            "UserInputAction",
            "askuser",
        )
        .with_parameter("question", "Which city?")])],
        vec![AgentEvent::chunk("Paris it is.")],
    ]);
    let agent = InlineAgent::new(invoker.clone(), spec().with_user_input(true))
        .with_user_input_handler(|question: String| async move {
            assert_eq!(question, "Which city?");
            Ok("Paris".to_string())
        });

    let completion = agent.invoke("Book a hotel").await.unwrap();
    assert_eq!(completion.text, "Paris it is.");

    let turns = invoker.turns();
    let InlineTurn::Results { results, .. } = &turns[1] else {
        panic!("second turn should carry results");
    };
    assert_eq!(results[0].body, "Paris");
    assert!(!results[0].is_error);
}

#[tokio::test]
async fn test_user_input_without_handler() {
    let invoker = ScriptedInvoker::new(vec![
        vec![hand_back(vec![FunctionInvocation::new(
            "UserInputAction",
            "askuser",
        )])],
        vec![AgentEvent::chunk("ok")],
    ]);
    let agent = InlineAgent::new(invoker.clone(), spec().with_user_input(true));

    agent.invoke("Book a hotel").await.unwrap();
    let turns = invoker.turns();
    let InlineTurn::Results { results, .. } = &turns[1] else {
        panic!("second turn should carry results");
    };
    assert!(results[0].is_error);
    assert_eq!(results[0].body, "No user is available to answer");
}

#[tokio::test]
async fn test_observed_inline_invocation() {
    let exporter = InMemorySpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    let observer = Observer::new(provider.tracer("runtime-tests"))
        .with_options(ObserveOptions::default().with_operation("invoke_inline_agent"));

    let invoker = ScriptedInvoker::new(vec![
        vec![hand_back(vec![
            FunctionInvocation::new("clock", "now").with_parameter("tz", "UTC"),
        ])],
        vec![AgentEvent::chunk("noon")],
    ]);
    let agent = InlineAgent::new(invoker, spec()).with_action_group(clock_group());

    let args = json!({ "sessionId": "sess-1", "inputText": "time?" });
    let observed = observer
        .observe_stream(args, |args| {
            let input = args["inputText"].as_str().unwrap_or_default().to_string();
            let events = agent.invoke_stream(input);
            async move { Ok::<_, RuntimeError>(events) }
        })
        .await
        .unwrap();
    let events: Vec<_> = observed.collect().await;
    assert_eq!(events.len(), 2);

    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 1);
    let span = &spans[0];
    assert_eq!(span.status, Status::Ok);
    let attr = |key: &str| {
        span.attributes
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| kv.value.to_string())
    };
    assert_eq!(attr(RESPONSE_KIND).as_deref(), Some("streamed"));
    assert_eq!(attr(RESPONSE_EVENT_COUNT).as_deref(), Some("2"));
}
