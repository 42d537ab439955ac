use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::decoder::TokenEvent;
use super::state::StreamState;
use crate::errors::ChatError;
use crate::models::{ChatMessage, ThoughtResponse};

/// Shown when the model finished without producing an answer.
pub const EMPTY_RESPONSE_FALLBACK: &str =
    "I wasn't able to put together a final answer this time. Please try asking again.";

/// Shown when the request itself failed.
pub const REQUEST_FAILED_MESSAGE: &str =
    "I apologize, but I encountered an error generating a response. Please try again.";

/// Folds token events into the in-progress assistant message.
#[derive(Debug, Clone)]
pub struct MessageAccumulator {
    state: StreamState,
}

impl MessageAccumulator {
    pub fn new(started_at: DateTime<Utc>, max_thinking_time: Duration) -> Self {
        Self { state: StreamState::new(started_at, max_thinking_time) }
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Apply one event and return the snapshot to publish for it.
    pub fn apply(&mut self, event: &TokenEvent, now: DateTime<Utc>) -> ThoughtResponse {
        self.state.step(event, now);
        self.state.snapshot()
    }

    /// Finalize after a completed stream. The response is never left empty.
    pub fn finish(mut self) -> ChatMessage {
        self.state.release_held();
        let mut content = self.state.snapshot();
        if content.response.is_empty() {
            debug!(
                "Stream ended without a response ({} chars of thought), using fallback",
                content.thought.len()
            );
            content.response = EMPTY_RESPONSE_FALLBACK.to_string();
        }
        ChatMessage::assistant_thought(content)
    }

    /// Finalize after a failed request, keeping whatever arrived before the failure.
    pub fn fail(mut self, error: &ChatError) -> ChatMessage {
        warn!("Generation request failed: {error}");
        self.state.release_held();
        let mut content = self.state.snapshot();
        if content.is_empty() {
            return ChatMessage::assistant(REQUEST_FAILED_MESSAGE);
        }
        if content.response.is_empty() {
            content.response = REQUEST_FAILED_MESSAGE.to_string();
        }
        ChatMessage::assistant_thought(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageContent;
    use crate::stream::state::DEFAULT_MAX_THINKING_TIME;

    fn accumulator() -> (MessageAccumulator, DateTime<Utc>) {
        let now = Utc::now();
        (MessageAccumulator::new(now, DEFAULT_MAX_THINKING_TIME), now)
    }

    #[test]
    fn publishes_progressive_snapshots() {
        let (mut acc, now) = accumulator();
        assert_eq!(acc.apply(&TokenEvent::text("abc"), now).thought, "abc");
        let snap = acc.apply(&TokenEvent::text("</think> hi"), now);
        assert_eq!(snap, ThoughtResponse { thought: "abc".into(), response: "hi".into() });
    }

    #[test]
    fn thought_only_stream_gets_fallback_response() {
        let (mut acc, now) = accumulator();
        acc.apply(&TokenEvent::text("abc"), now);

        let msg = acc.finish();
        assert_eq!(
            msg.content,
            MessageContent::Thought(ThoughtResponse {
                thought: "abc".into(),
                response: EMPTY_RESPONSE_FALLBACK.into(),
            })
        );
    }

    #[test]
    fn failure_keeps_partial_thought() {
        let (mut acc, now) = accumulator();
        acc.apply(&TokenEvent::text("half a thought"), now);

        let msg = acc.fail(&ChatError::StreamRead("connection reset".into()));
        match msg.content {
            MessageContent::Thought(content) => {
                assert_eq!(content.thought, "half a thought");
                assert_eq!(content.response, REQUEST_FAILED_MESSAGE);
            }
            other => panic!("unexpected content: {other:?}"),
        }
    }

    #[test]
    fn failure_with_nothing_accumulated_is_plain_error() {
        let (acc, _) = accumulator();
        let msg = acc.fail(&ChatError::ServerStatus { status: 500, body: String::new() });
        assert_eq!(msg, ChatMessage::assistant(REQUEST_FAILED_MESSAGE));
    }

    #[test]
    fn failure_keeps_partial_response() {
        let (mut acc, now) = accumulator();
        acc.apply(&TokenEvent::text("x</think>Partial"), now);
        let msg = acc.fail(&ChatError::StreamRead("eof".into()));
        match msg.content {
            MessageContent::Thought(content) => assert_eq!(content.response, "Partial"),
            other => panic!("unexpected content: {other:?}"),
        }
    }
}
