#![cfg(feature = "native")]

use thinkchat::models::{ChatMessage, MessageContent, ThoughtResponse, GREETING};
use thinkchat::session::{FileStorage, MemoryStorage, SessionStorage};
use thinkchat::SessionStore;

fn greeting_only() -> Vec<ChatMessage> {
    vec![ChatMessage::assistant(GREETING)]
}

#[test]
fn first_user_message_names_the_session_once() {
    let mut store = SessionStore::load(MemoryStorage::new());
    let id = store.active_id().to_string();
    assert_eq!(store.get(&id).unwrap().name, "Chat 1");

    let mut messages = greeting_only();
    messages.push(ChatMessage::user("What is the capital of France please"));
    messages.push(ChatMessage::assistant_thought(ThoughtResponse::default()));
    store.update_messages(&id, messages.clone()).unwrap();
    assert_eq!(store.get(&id).unwrap().name, "What is the capital...");

    messages.push(ChatMessage::user("And of Spain?"));
    store.update_messages(&id, messages).unwrap();
    assert_eq!(store.get(&id).unwrap().name, "What is the capital...");
}

#[test]
fn deleting_the_last_session_starts_over() {
    let mut store = SessionStore::load(MemoryStorage::new());
    let only = store.active_id().to_string();

    store.delete_session(&only).unwrap();

    assert_eq!(store.len(), 1);
    let fresh = store.active_session().unwrap();
    assert_ne!(fresh.id, only);
    assert_eq!(fresh.messages, greeting_only());
    assert_eq!(store.active_id(), fresh.id);

    let saved = store.storage().contents().expect("storage rewritten after delete");
    let saved: Vec<serde_json::Value> = serde_json::from_str(&saved).unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0]["id"], fresh.id.as_str());
}

#[test]
fn sessions_survive_a_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.json");

    let (first, second) = {
        let mut store = SessionStore::load(FileStorage::new(&path));
        let first = store.active_id().to_string();
        let second = store.create_session().id;
        let mut messages = greeting_only();
        messages.push(ChatMessage::user("hello"));
        messages.push(ChatMessage::assistant_thought(ThoughtResponse {
            thought: "greet back".to_string(),
            response: "Hi!".to_string(),
        }));
        store.update_messages(&second, messages).unwrap();
        (first, second)
    };

    let store = SessionStore::load(FileStorage::new(&path));
    let ids: Vec<_> = store.sessions().map(|s| s.id.clone()).collect();
    assert_eq!(ids, vec![second.clone(), first]);

    let restored = store.get(&second).unwrap();
    assert_eq!(restored.name, "hello");
    assert_eq!(
        restored.messages[2].content,
        MessageContent::Thought(ThoughtResponse {
            thought: "greet back".to_string(),
            response: "Hi!".to_string(),
        })
    );
}

#[test]
fn persisted_layout_uses_camel_case_and_plain_text_content() {
    let store = SessionStore::load(MemoryStorage::new());
    let raw = store.storage().contents().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();

    let session = &value[0];
    assert!(session["createdAt"].is_string());
    assert_eq!(session["messages"][0]["role"], "assistant");
    assert_eq!(session["messages"][0]["content"], GREETING);
}

#[test]
fn unreadable_file_falls_back_to_a_fresh_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.json");
    std::fs::write(&path, "[{\"id\": 42}]").unwrap();

    let store = SessionStore::load(FileStorage::new(&path));
    assert_eq!(store.len(), 1);
    assert!(store.active_session().unwrap().is_greeting_only());

    let rewritten = FileStorage::new(&path).load().unwrap().unwrap();
    assert!(rewritten.contains(GREETING));
}
