//! Streaming generation: SSE frames -> token events -> thought/response buffers.

pub mod accumulator;
pub mod decoder;
pub mod state;

pub use accumulator::{MessageAccumulator, EMPTY_RESPONSE_FALLBACK, REQUEST_FAILED_MESSAGE};
pub use decoder::{FinishReason, SseDecoder, TokenEvent};
pub use state::{clamp_thinking_time, Phase, StreamState, DEFAULT_MAX_THINKING_TIME, THINK_END_MARKER};
