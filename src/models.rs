use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Greeting every new session starts with.
pub const GREETING: &str = "Hello! How can I assist you today?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assistant output split into the model's reasoning and its final answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThoughtResponse {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub thought: String,
    #[serde(default)]
    pub response: String,
}

impl ThoughtResponse {
    pub fn is_empty(&self) -> bool {
        self.thought.is_empty() && self.response.is_empty()
    }
}

/// Message body: plain text for user turns and canned assistant text, or a two-phase answer.
///
/// Serialized untagged so a persisted message reads either
/// `"content": "..."` or `"content": { "thought": "...", "response": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Thought(ThoughtResponse),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: MessageContent::Text(text.into()) }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: MessageContent::Text(text.into()) }
    }

    pub fn assistant_thought(content: ThoughtResponse) -> Self {
        Self { role: MessageRole::Assistant, content: MessageContent::Thought(content) }
    }

    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }

    /// Plain-text body, if this message is not a thought/response pair.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(t) => Some(t),
            MessageContent::Thought(_) => None,
        }
    }
}

/// One conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub name: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(name: String) -> Self {
        Self {
            id: format!("session-{}", uuid::Uuid::new_v4()),
            name,
            messages: vec![ChatMessage::assistant(GREETING)],
            created_at: Utc::now(),
        }
    }

    /// True while the session holds nothing but its opening assistant message.
    pub fn is_greeting_only(&self) -> bool {
        is_greeting_only(&self.messages)
    }
}

pub(crate) fn is_greeting_only(messages: &[ChatMessage]) -> bool {
    messages.len() == 1 && messages[0].role == MessageRole::Assistant
}

// ── Wire types: /api/generate ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub stream: bool,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Non-streaming response: either `{ "text": ... }` or OpenAI-style `{ "choices": [{ "text": ... }] }`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

impl GenerateResponse {
    pub fn into_text(self) -> Option<String> {
        match self.text {
            Some(text) if !text.is_empty() => Some(text),
            _ => self.choices.into_iter().next().map(|c| c.text),
        }
    }
}

/// JSON payload of one `data: ` line in a streaming response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    /// Set instead of `choices` when generation failed mid-stream.
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

// ── Wire types: /api/health ───────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub model_loaded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_content_reads_both_shapes() {
        let json = r#"[
            {"role": "user", "content": "hi"},
            {"role": "assistant", "content": {"thought": "hmm", "response": "hello"}},
            {"role": "assistant", "content": {"response": "no thought"}}
        ]"#;
        let msgs: Vec<ChatMessage> = serde_json::from_str(json).unwrap();
        assert_eq!(msgs[0], ChatMessage::user("hi"));
        assert_eq!(
            msgs[1].content,
            MessageContent::Thought(ThoughtResponse {
                thought: "hmm".to_string(),
                response: "hello".to_string(),
            })
        );
        assert_eq!(msgs[2].text(), None);
    }

    #[test]
    fn session_serializes_camel_case() {
        let session = Session::new("Chat 1".to_string());
        let value = serde_json::to_value(&session).unwrap();
        assert!(value.get("createdAt").is_some());
        assert!(session.id.starts_with("session-"));
        assert!(session.is_greeting_only());
    }

    #[test]
    fn generate_response_prefers_text_then_choices() {
        let r: GenerateResponse = serde_json::from_str(r#"{"text": "a"}"#).unwrap();
        assert_eq!(r.into_text().as_deref(), Some("a"));

        let r: GenerateResponse =
            serde_json::from_str(r#"{"text": "", "choices": [{"text": "b"}]}"#).unwrap();
        assert_eq!(r.into_text().as_deref(), Some("b"));

        let r: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(r.into_text(), None);
    }
}
