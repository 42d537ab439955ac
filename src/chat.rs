use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::errors::ChatError;
use crate::models::{ChatMessage, GenerateRequest, MessageContent, ThoughtResponse};
use crate::stream::{MessageAccumulator, SseDecoder, DEFAULT_MAX_THINKING_TIME};

const MAX_PROMPT_LENGTH: usize = 8000;

pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Per-request generation knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_thinking_time: Duration,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            max_thinking_time: DEFAULT_MAX_THINKING_TIME,
        }
    }
}

/// One user prompt and the assistant reply streaming in for it.
///
/// The message list is captured when the turn begins, so updates only ever land on the
/// session that started the request, whichever session is active by then.
#[derive(Debug)]
pub struct ChatTurn {
    session_id: String,
    messages: Vec<ChatMessage>,
    decoder: SseDecoder,
    accumulator: MessageAccumulator,
}

impl ChatTurn {
    /// Validate the prompt, append the user message and an empty assistant placeholder, and
    /// build the streaming request for it.
    pub fn begin(
        session_id: &str,
        history: &[ChatMessage],
        prompt: &str,
        settings: &TurnSettings,
        now: DateTime<Utc>,
    ) -> Result<(Self, GenerateRequest), ChatError> {
        if prompt.trim().is_empty() {
            return Err(ChatError::EmptyField { field_name: "prompt".to_string() });
        }
        if prompt.len() > MAX_PROMPT_LENGTH {
            return Err(ChatError::FieldTooLong {
                field_name: "prompt".to_string(),
                max_length: MAX_PROMPT_LENGTH,
                actual_length: prompt.len(),
            });
        }

        let mut messages = history.to_vec();
        messages.push(ChatMessage::user(prompt));
        messages.push(ChatMessage::assistant_thought(ThoughtResponse::default()));

        let request = GenerateRequest {
            prompt: prompt.to_string(),
            stream: true,
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            session_id: Some(session_id.to_string()),
        };
        let turn = Self {
            session_id: session_id.to_string(),
            messages,
            decoder: SseDecoder::new(),
            accumulator: MessageAccumulator::new(now, settings.max_thinking_time),
        };
        Ok((turn, request))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Current message list, ending with the in-progress assistant message.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// True once the stream signalled `[DONE]`; further chunks are ignored.
    pub fn is_done(&self) -> bool {
        self.decoder.is_done()
    }

    /// Feed one body chunk. `publish` is called once per decoded token event with the updated
    /// message list. Returns the number of events processed.
    pub fn feed<F>(&mut self, chunk: &[u8], now: DateTime<Utc>, publish: &mut F) -> usize
    where
        F: FnMut(&[ChatMessage]),
    {
        let events = self.decoder.feed(chunk);
        for event in &events {
            let content = self.accumulator.apply(event, now);
            self.set_reply(MessageContent::Thought(content));
            publish(&self.messages);
        }
        events.len()
    }

    /// The body ended (or `[DONE]` arrived): flush and finalize the reply.
    pub fn finish(mut self, now: DateTime<Utc>) -> Vec<ChatMessage> {
        for event in self.decoder.finish() {
            self.accumulator.apply(&event, now);
        }
        debug!(
            "Turn for session {} finished ({} malformed frame(s) skipped)",
            self.session_id,
            self.decoder.skipped_frames()
        );
        let Self { mut messages, accumulator, .. } = self;
        replace_reply(&mut messages, accumulator.finish());
        messages
    }

    /// The request failed: keep what arrived and finalize with the error policy.
    pub fn fail(self, error: &ChatError) -> Vec<ChatMessage> {
        let Self { mut messages, accumulator, .. } = self;
        replace_reply(&mut messages, accumulator.fail(error));
        messages
    }

    fn set_reply(&mut self, content: MessageContent) {
        if let Some(last) = self.messages.last_mut() {
            last.content = content;
        }
    }
}

fn replace_reply(messages: &mut [ChatMessage], reply: ChatMessage) {
    if let Some(last) = messages.last_mut() {
        *last = reply;
    }
}
