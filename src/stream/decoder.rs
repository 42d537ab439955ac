use tracing::{debug, warn};

use crate::models::StreamChunk;

const DATA_PREFIX: &str = "data: ";
const DONE_PAYLOAD: &str = "[DONE]";

/// Why the server stopped generating, as reported in `choices[0].finish_reason`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    Error,
    Timeout,
    Other(String),
}

impl FinishReason {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "error" => FinishReason::Error,
            "timeout" => FinishReason::Timeout,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

/// One decoded `data: ` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEvent {
    pub text: String,
    pub finish_reason: Option<FinishReason>,
}

impl TokenEvent {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), finish_reason: None }
    }

    pub fn finished(text: impl Into<String>, reason: FinishReason) -> Self {
        Self { text: text.into(), finish_reason: Some(reason) }
    }
}

/// Incremental decoder for a newline-delimited SSE body.
///
/// Bytes are buffered until a `\n` arrives. A newline byte never occurs inside a multi-byte
/// UTF-8 sequence, so splitting on it before decoding keeps code points that straddle chunk
/// boundaries intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
    skipped_frames: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once `data: [DONE]` was seen or the body was flushed with [`SseDecoder::finish`].
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Number of frames dropped because their payload was not valid JSON.
    pub fn skipped_frames(&self) -> usize {
        self.skipped_frames
    }

    /// Consume one chunk of the body and return the token events completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<TokenEvent> {
        let mut events = Vec::new();
        if self.done {
            return events;
        }
        self.buffer.extend_from_slice(chunk);

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.decode_line(&line[..pos], &mut events);
            if self.done {
                // Anything after [DONE] is ignored, even within the same chunk.
                self.buffer.clear();
                break;
            }
        }
        events
    }

    /// Flush a trailing line that was not newline-terminated when the body ended.
    pub fn finish(&mut self) -> Vec<TokenEvent> {
        let mut events = Vec::new();
        if !self.done && !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.decode_line(&line, &mut events);
        }
        self.buffer.clear();
        self.done = true;
        events
    }

    fn decode_line(&mut self, raw: &[u8], events: &mut Vec<TokenEvent>) {
        let text = String::from_utf8_lossy(raw);
        let line = text.strip_suffix('\r').unwrap_or(&*text);
        if line.trim().is_empty() {
            return;
        }

        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            debug!("Ignoring non-data SSE line: {line}");
            return;
        };
        let payload = payload.trim();
        if payload == DONE_PAYLOAD {
            self.done = true;
            return;
        }

        match parse_payload(payload) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => debug!("SSE frame without choices: {payload}"),
            Err(e) => {
                self.skipped_frames += 1;
                warn!("Skipping malformed SSE frame: {e}, data: {payload}");
            }
        }
    }
}

/// Parse the JSON payload of one `data: ` line.
///
/// Returns `Ok(None)` for a well-formed frame that carries no choice.
pub fn parse_payload(payload: &str) -> Result<Option<TokenEvent>, serde_json::Error> {
    let chunk: StreamChunk = serde_json::from_str(payload)?;
    if let Some(error) = chunk.error {
        return Ok(Some(TokenEvent::finished(error, FinishReason::Error)));
    }
    Ok(chunk.choices.into_iter().next().map(|choice| TokenEvent {
        text: choice.text,
        finish_reason: choice.finish_reason.as_deref().map(FinishReason::from_wire),
    }))
}
