use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::decoder::{FinishReason, TokenEvent};
use crate::models::ThoughtResponse;

/// Separates the model's reasoning from its answer.
pub const THINK_END_MARKER: &str = "</think>";

pub const DEFAULT_MAX_THINKING_TIME: Duration = Duration::from_secs(10);
pub const MIN_MAX_THINKING_TIME: Duration = Duration::from_secs(3);
pub const MAX_MAX_THINKING_TIME: Duration = Duration::from_secs(30);

const TIME_LIMIT_NOTE: &str = "[Thinking time limit reached, moving on to the answer.]";
const TIMEOUT_NOTE: &str = "[Generation timed out while the model was still thinking.]";
const TRUNCATED_NOTE: &str = "[Response truncated: generation timed out.]";
const SUMMARY_INTRO: &str = "Based on my reasoning so far:";
const NO_SUMMARY: &str = "I ran out of time before reaching a conclusion.";
const SUMMARY_LINES: usize = 3;

/// Clamp a user-chosen thinking budget into the supported 3–30 s window.
pub fn clamp_thinking_time(limit: Duration) -> Duration {
    limit.clamp(MIN_MAX_THINKING_TIME, MAX_MAX_THINKING_TIME)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Thinking,
    Responding,
}

/// Running buffers of one in-flight generation.
///
/// Transitions are one-way: once `Responding`, the state never goes back to `Thinking`.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamState {
    thought: String,
    response: String,
    phase: Phase,
    started_at: DateTime<Utc>,
    max_thinking: chrono::Duration,
    /// Tail of the thought that could be the start of a marker split across tokens.
    held: String,
    /// Response starts with a summary synthesized from the thought; the real answer has not
    /// been confirmed by a marker yet.
    provisional: bool,
    /// Byte length of the synthesized summary at the start of a provisional response.
    summary_len: usize,
    /// The real marker arrived after a summary; the next non-blank text replaces the summary.
    answer_pending: bool,
}

impl StreamState {
    pub fn new(started_at: DateTime<Utc>, max_thinking_time: Duration) -> Self {
        let limit = clamp_thinking_time(max_thinking_time);
        Self {
            thought: String::new(),
            response: String::new(),
            phase: Phase::Thinking,
            started_at,
            max_thinking: chrono::Duration::from_std(limit)
                .unwrap_or_else(|_| chrono::Duration::seconds(10)),
            held: String::new(),
            provisional: false,
            summary_len: 0,
            answer_pending: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn thought(&self) -> &str {
        &self.thought
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn is_provisional(&self) -> bool {
        self.provisional
    }

    /// Pure reducer: `(state, event) -> state`.
    pub fn reduce(mut self, event: &TokenEvent, now: DateTime<Utc>) -> Self {
        self.step(event, now);
        self
    }

    /// Close the stream: a held-back partial marker was ordinary thought text after all.
    pub fn end(mut self) -> Self {
        self.release_held();
        self
    }

    /// Trimmed view handed to observers.
    pub fn snapshot(&self) -> ThoughtResponse {
        ThoughtResponse {
            thought: self.thought.trim().to_string(),
            response: self.response.trim().to_string(),
        }
    }

    pub(crate) fn step(&mut self, event: &TokenEvent, now: DateTime<Utc>) {
        if self.phase == Phase::Thinking && now - self.started_at > self.max_thinking {
            debug!("Thinking exceeded {}s, forcing response phase", self.max_thinking.num_seconds());
            self.force_responding(TIME_LIMIT_NOTE);
        }

        match event.finish_reason {
            Some(FinishReason::Error) => self.annotate_error(&event.text),
            Some(FinishReason::Timeout) => {
                self.push_text(&event.text);
                self.timed_out();
            }
            _ => self.push_text(&event.text),
        }
    }

    pub(crate) fn release_held(&mut self) {
        let held = std::mem::take(&mut self.held);
        self.thought.push_str(&held);
    }

    fn push_text(&mut self, text: &str) {
        match self.phase {
            Phase::Thinking => {
                let mut combined = std::mem::take(&mut self.held);
                combined.push_str(text);
                if let Some(idx) = combined.find(THINK_END_MARKER) {
                    self.thought.push_str(&combined[..idx]);
                    self.phase = Phase::Responding;
                    self.push_response(&combined[idx + THINK_END_MARKER.len()..]);
                } else {
                    let split = combined.len() - partial_marker_len(&combined);
                    self.thought.push_str(&combined[..split]);
                    self.held = combined[split..].to_string();
                }
            }
            Phase::Responding => match text.find(THINK_END_MARKER) {
                // Marker arriving after a forced transition: everything streamed since then
                // was still reasoning. The summary stays until real answer text shows up.
                Some(idx) if self.provisional && !self.answer_pending => {
                    let streamed = self.response.split_off(self.summary_len);
                    self.thought.push_str(&streamed);
                    self.thought.push_str(&text[..idx]);
                    self.answer_pending = true;
                    self.push_response(&text[idx + THINK_END_MARKER.len()..]);
                }
                // Already answering: a stray marker is dropped, the text stays in the response.
                Some(idx) => {
                    self.push_response(&text[..idx]);
                    self.push_response(&text[idx + THINK_END_MARKER.len()..]);
                }
                None => self.push_response(text),
            },
        }
    }

    fn push_response(&mut self, text: &str) {
        if self.provisional && self.answer_pending {
            if text.trim().is_empty() {
                return;
            }
            self.response.clear();
            self.response.push_str(text.trim_start());
            self.settle();
        } else if self.provisional && self.response.len() == self.summary_len {
            if text.trim().is_empty() {
                return;
            }
            self.response.push_str("\n\n");
            self.response.push_str(text.trim_start());
        } else if self.response.is_empty() {
            self.response.push_str(text.trim_start());
        } else {
            self.response.push_str(text);
        }
    }

    fn provide_summary(&mut self, summary: String) {
        self.summary_len = summary.len();
        self.response = summary;
        self.provisional = true;
        self.answer_pending = false;
    }

    /// Move to `Responding` with a note in the thought; make sure a response exists.
    fn force_responding(&mut self, note: &str) {
        self.release_held();
        let summary = summarize(&self.thought);
        self.phase = Phase::Responding;
        append_block(&mut self.thought, note);
        if self.response.trim().is_empty() {
            self.provide_summary(summary);
        }
    }

    fn timed_out(&mut self) {
        if self.phase == Phase::Thinking {
            self.force_responding(TIMEOUT_NOTE);
        } else if self.response.trim().is_empty() {
            self.provide_summary(summarize(&self.thought));
        } else {
            append_block(&mut self.response, TRUNCATED_NOTE);
            self.settle();
        }
    }

    fn annotate_error(&mut self, text: &str) {
        let detail = if text.trim().is_empty() { "generation failed" } else { text.trim() };
        append_block(&mut self.response, &format!("[Error: {detail}]"));
        self.settle();
    }

    /// Whatever the response holds now is final.
    fn settle(&mut self) {
        self.provisional = false;
        self.answer_pending = false;
    }
}

/// Best-effort answer built from the last few non-empty lines of the reasoning.
fn summarize(thought: &str) -> String {
    let lines: Vec<&str> = thought
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return NO_SUMMARY.to_string();
    }
    let tail = &lines[lines.len().saturating_sub(SUMMARY_LINES)..];
    format!("{SUMMARY_INTRO}\n\n{}", tail.join("\n"))
}

fn append_block(buffer: &mut String, block: &str) {
    if !buffer.trim().is_empty() {
        buffer.push_str("\n\n");
    } else {
        buffer.clear();
    }
    buffer.push_str(block);
}

/// Length of the longest suffix of `text` that is a proper prefix of the marker.
fn partial_marker_len(text: &str) -> usize {
    (1..THINK_END_MARKER.len())
        .rev()
        .find(|&n| text.ends_with(&THINK_END_MARKER[..n]))
        .unwrap_or(0)
}
