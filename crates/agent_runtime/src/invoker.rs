//! Contracts for the agent backends.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use inline_agent_core::{AgentError, AgentEvent, Completion, InlineAgentSpec, InlineTurn, InvokeRequest};

/// Events of one agent response, in arrival order.
pub type AgentEventStream = Pin<Box<dyn Stream<Item = Result<AgentEvent, AgentError>> + Send>>;

/// Invokes a managed (pre-deployed) agent.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke_agent(&self, request: InvokeRequest) -> Result<AgentEventStream, AgentError>;
}

/// Invokes an agent defined per call.
#[async_trait]
pub trait InlineInvoker: Send + Sync {
    async fn invoke_inline(
        &self,
        spec: &InlineAgentSpec,
        turn: InlineTurn,
    ) -> Result<AgentEventStream, AgentError>;
}

pub fn event_stream<S>(stream: S) -> AgentEventStream
where
    S: Stream<Item = Result<AgentEvent, AgentError>> + Send + 'static,
{
    Box::pin(stream)
}

/// Fails with [`AgentError::Timeout`] when the next event takes longer than
/// `idle` to arrive.
pub fn with_idle_timeout(stream: AgentEventStream, idle: Duration) -> AgentEventStream {
    let millis = idle.as_millis() as u64;
    Box::pin(async_stream::stream! {
        let mut stream = stream;
        loop {
            match tokio::time::timeout(idle, stream.next()).await {
                Ok(Some(item)) => {
                    let failed = item.is_err();
                    yield item;
                    if failed {
                        break;
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    yield Err(AgentError::Timeout(millis));
                    break;
                }
            }
        }
    })
}

/// Drain a stream into a [`Completion`], stopping at the first error.
pub async fn collect(mut stream: AgentEventStream) -> Result<Completion, AgentError> {
    let mut completion = Completion::default();
    while let Some(event) = stream.next().await {
        completion.push(event?);
    }
    Ok(completion)
}

/// Decodes chunk bytes as UTF-8 across chunk boundaries.
///
/// A multibyte character split between two chunks is held back until the
/// rest of it arrives. Bytes that can never form a character become U+FFFD.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    pending: Vec<u8>,
}

impl ChunkDecoder {
    /// Text completed by `bytes`, or `None` if nothing is complete yet.
    pub fn push(&mut self, bytes: &[u8]) -> Option<String> {
        self.pending.extend_from_slice(bytes);

        let mut text = String::new();
        let consumed = {
            let mut rest: &[u8] = &self.pending;
            loop {
                match std::str::from_utf8(rest) {
                    Ok(valid) => {
                        text.push_str(valid);
                        rest = &[];
                        break;
                    }
                    Err(e) => {
                        let (valid, after) = rest.split_at(e.valid_up_to());
                        text.push_str(&String::from_utf8_lossy(valid));
                        match e.error_len() {
                            Some(len) => {
                                text.push(char::REPLACEMENT_CHARACTER);
                                rest = &after[len..];
                            }
                            // Incomplete sequence at the end
                            None => {
                                rest = after;
                                break;
                            }
                        }
                    }
                }
            }
            self.pending.len() - rest.len()
        };
        self.pending.drain(..consumed);

        (!text.is_empty()).then_some(text)
    }

    /// Whatever is still held back, decoded lossily.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(text)
    }
}
