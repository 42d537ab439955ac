use std::time::Duration;

use chrono::{DateTime, Utc};
use thinkchat::models::{ChatMessage, MessageContent, ThoughtResponse, GREETING};
use thinkchat::stream::{
    MessageAccumulator, Phase, SseDecoder, StreamState, TokenEvent, EMPTY_RESPONSE_FALLBACK,
};
use thinkchat::{ChatTurn, TurnSettings};

fn sse(texts: &[&str]) -> String {
    let mut body = String::new();
    for text in texts {
        body.push_str(&format!(
            "data: {}\n\n",
            serde_json::json!({ "choices": [{ "text": text, "finish_reason": null }] })
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn run_chunks(body: &[u8], split_points: &[usize], now: DateTime<Utc>) -> Vec<ChatMessage> {
    let (mut turn, _) = ChatTurn::begin(
        "session-test",
        &[ChatMessage::assistant(GREETING)],
        "question",
        &TurnSettings::default(),
        now,
    )
    .unwrap();

    let mut last = 0;
    for &point in split_points.iter().chain(std::iter::once(&body.len())) {
        turn.feed(&body[last..point], now, &mut |_: &[ChatMessage]| {});
        last = point;
    }
    turn.finish(now)
}

fn reply(messages: &[ChatMessage]) -> ThoughtResponse {
    match &messages.last().unwrap().content {
        MessageContent::Thought(content) => content.clone(),
        other => panic!("expected thought/response, got {other:?}"),
    }
}

#[test]
fn marker_split_is_independent_of_chunk_boundaries() {
    let body = sse(&["I should recall ", "geography.</think>", "\n\nThe capital ", "is Paris. ✅"]);
    let bytes = body.as_bytes();
    let now = Utc::now();

    let expected = ThoughtResponse {
        thought: "I should recall geography.".to_string(),
        response: "The capital is Paris. ✅".to_string(),
    };

    for split in 1..bytes.len() {
        assert_eq!(reply(&run_chunks(bytes, &[split], now)), expected, "split at {split}");
    }
    assert_eq!(reply(&run_chunks(bytes, &(1..bytes.len()).collect::<Vec<_>>(), now)), expected);
}

#[test]
fn tokens_follow_the_current_phase() {
    let start = Utc::now();
    let mut state = StreamState::new(start, Duration::from_secs(10));
    let mut seen_responding = false;

    for text in ["alpha ", "beta", "</think>gamma", " delta", " epsilon"] {
        state = state.reduce(&TokenEvent::text(text), start);
        if seen_responding {
            assert_eq!(state.phase(), Phase::Responding);
        }
        seen_responding |= state.phase() == Phase::Responding;
    }

    assert_eq!(state.thought(), "alpha beta");
    assert_eq!(state.response(), "gamma delta epsilon");
}

#[test]
fn thinking_past_the_limit_guarantees_a_response() {
    let start = Utc::now();
    let late = start + chrono::Duration::seconds(11);
    let mut acc = MessageAccumulator::new(start, Duration::from_secs(10));

    acc.apply(&TokenEvent::text("Considering options.\nOption B looks best."), start);
    let snapshot = acc.apply(&TokenEvent::text("\n"), late);

    assert_eq!(acc.state().phase(), Phase::Responding);
    assert!(!snapshot.response.is_empty());

    let later = acc.apply(&TokenEvent::text(""), late);
    assert!(!later.response.is_empty());
}

#[test]
fn late_marker_with_empty_tail_keeps_a_response() {
    let start = Utc::now();
    let late = start + chrono::Duration::seconds(11);
    let mut acc = MessageAccumulator::new(start, Duration::from_secs(10));

    acc.apply(&TokenEvent::text("Considering options.\nOption B."), start);
    let forced = acc.apply(&TokenEvent::text(" still"), late);
    assert!(!forced.response.is_empty());

    for text in [" done.</think>", "\n\n", " "] {
        let snapshot = acc.apply(&TokenEvent::text(text), late);
        assert!(!snapshot.response.is_empty(), "response emptied by {text:?}");
    }

    let answer = acc.apply(&TokenEvent::text("Option B."), late);
    assert_eq!(answer.response, "Option B.");
    assert!(answer.thought.ends_with("still done."));
}

#[test]
fn thought_only_stream_finalizes_with_fallback() {
    let body = sse(&["abc"]);
    let messages = run_chunks(body.as_bytes(), &[], Utc::now());
    assert_eq!(
        reply(&messages),
        ThoughtResponse { thought: "abc".to_string(), response: EMPTY_RESPONSE_FALLBACK.to_string() }
    );
}

#[test]
fn done_halts_events_in_the_same_chunk() {
    let body = format!("{}{}", sse(&["x</think>first"]), sse(&[" second"]));
    let mut decoder = SseDecoder::new();

    let events = decoder.feed(body.as_bytes());
    assert_eq!(events, vec![TokenEvent::text("x</think>first")]);
    assert!(decoder.is_done());
}

#[test]
fn malformed_frame_does_not_lose_the_rest() {
    let body = format!(
        "data: {}\n\ndata: {{\"choices\": [\n\ndata: {}\n\ndata: [DONE]\n\n",
        serde_json::json!({ "choices": [{ "text": "t</think>Hello" }] }),
        serde_json::json!({ "choices": [{ "text": ", world" }] }),
    );
    let messages = run_chunks(body.as_bytes(), &[10, 40], Utc::now());
    assert_eq!(reply(&messages).response, "Hello, world");
}
