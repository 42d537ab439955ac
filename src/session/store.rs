use std::collections::HashMap;

use tracing::{info, warn};

use super::storage::SessionStorage;
use crate::errors::ChatError;
use crate::models::{ChatMessage, Session};

const NAME_WORDS: usize = 4;

/// Display name derived from a message: its first four words, with `...` when there were more.
pub fn session_name_from(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let name = words.iter().take(NAME_WORDS).copied().collect::<Vec<_>>().join(" ");
    if words.len() > NAME_WORDS {
        format!("{name}...")
    } else {
        name
    }
}

/// All conversation threads, keyed by id, plus the active-session pointer.
///
/// Invariant: `active_id` always names a session in `sessions`, and `order` lists every key
/// exactly once, most recent first. Every mutation is written through to storage.
pub struct SessionStore<S> {
    storage: S,
    sessions: HashMap<String, Session>,
    order: Vec<String>,
    active_id: String,
}

impl<S: SessionStorage> SessionStore<S> {
    /// Restore sessions from storage. Missing or corrupt data starts a fresh session.
    pub fn load(storage: S) -> Self {
        let restored = match storage.load() {
            Ok(Some(raw)) => serde_json::from_str::<Vec<Session>>(&raw).unwrap_or_else(|e| {
                warn!("Discarding unreadable saved sessions: {e}");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to read saved sessions: {e}");
                Vec::new()
            }
        };

        let mut store = Self {
            storage,
            sessions: HashMap::new(),
            order: Vec::new(),
            active_id: String::new(),
        };
        for session in restored {
            if store.sessions.contains_key(&session.id) {
                warn!("Dropping duplicate saved session {}", session.id);
                continue;
            }
            store.order.push(session.id.clone());
            store.sessions.insert(session.id.clone(), session);
        }

        match store.order.first().cloned() {
            Some(id) => {
                info!("Restored {} chat session(s)", store.order.len());
                store.active_id = id;
            }
            None => {
                store.create_session();
            }
        }
        store
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Sessions in display order, most recent first.
    pub fn sessions(&self) -> impl Iterator<Item = &Session> + '_ {
        self.order.iter().filter_map(|id| self.sessions.get(id))
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.sessions.get(&self.active_id)
    }

    pub fn set_active(&mut self, id: &str) -> Result<(), ChatError> {
        if !self.sessions.contains_key(id) {
            return Err(ChatError::SessionNotFound { id: id.to_string() });
        }
        self.active_id = id.to_string();
        Ok(())
    }

    /// Start a new conversation with the greeting and make it active.
    pub fn create_session(&mut self) -> Session {
        let session = Session::new(format!("Chat {}", self.sessions.len() + 1));
        self.active_id = session.id.clone();
        self.upsert(session.clone());
        info!("Created chat session {}", session.id);
        session
    }

    /// Insert or replace a session. New sessions go to the front of the list.
    pub fn upsert(&mut self, session: Session) {
        if !self.sessions.contains_key(&session.id) {
            self.order.insert(0, session.id.clone());
        }
        self.sessions.insert(session.id.clone(), session);
        self.persist();
    }

    /// Remove a session without touching the active pointer or storage policy.
    fn remove(&mut self, id: &str) -> Option<Session> {
        let removed = self.sessions.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(removed)
    }

    /// Delete a session. The active pointer moves to the most recent remaining session, and
    /// when none remain storage is cleared and a fresh session is created.
    pub fn delete_session(&mut self, id: &str) -> Result<(), ChatError> {
        self.remove(id)
            .ok_or_else(|| ChatError::SessionNotFound { id: id.to_string() })?;
        info!("Deleted chat session {id}");

        let Some(next) = self.order.first().cloned() else {
            if let Err(e) = self.storage.clear() {
                warn!("Failed to clear saved sessions: {e}");
            }
            self.create_session();
            return Ok(());
        };

        if self.active_id == id {
            self.active_id = next;
        }
        self.persist();
        Ok(())
    }

    /// Replace a session's messages. The first time a greeting-only session gains a user
    /// turn, it is renamed after that turn.
    pub fn update_messages(&mut self, id: &str, messages: Vec<ChatMessage>) -> Result<(), ChatError> {
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| ChatError::SessionNotFound { id: id.to_string() })?;

        let first_user_turn = session.is_greeting_only() && messages.iter().any(ChatMessage::is_user);
        session.messages = messages;
        if first_user_turn {
            if let Some(name) = name_from_messages(&session.messages) {
                session.name = name;
            }
        }
        self.persist();
        Ok(())
    }

    /// Name a session after its first plain-text user message. Returns the new name, or
    /// `None` when there is no such message.
    pub fn rename_from_first_user_message(
        &mut self,
        id: &str,
        messages: &[ChatMessage],
    ) -> Result<Option<String>, ChatError> {
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| ChatError::SessionNotFound { id: id.to_string() })?;

        let Some(name) = name_from_messages(messages) else {
            return Ok(None);
        };
        session.name = name.clone();
        self.persist();
        Ok(Some(name))
    }

    fn persist(&self) {
        let ordered: Vec<&Session> = self.sessions().collect();
        let result = serde_json::to_string(&ordered)
            .map_err(ChatError::from)
            .and_then(|payload| self.storage.save(&payload));
        if let Err(e) = result {
            warn!("Failed to save chat sessions: {e}");
        }
    }
}

fn name_from_messages(messages: &[ChatMessage]) -> Option<String> {
    messages
        .iter()
        .filter(|m| m.is_user())
        .find_map(ChatMessage::text)
        .map(session_name_from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::storage::MemoryStorage;

    #[test]
    fn names_use_first_four_words() {
        assert_eq!(session_name_from("What is the capital of France please"), "What is the capital...");
        assert_eq!(session_name_from("Hello there"), "Hello there");
        assert_eq!(session_name_from("one two three four"), "one two three four");
    }

    #[test]
    fn empty_storage_creates_one_session() {
        let store = SessionStore::load(MemoryStorage::new());
        assert_eq!(store.len(), 1);
        assert_eq!(store.active_session().unwrap().name, "Chat 1");
        assert!(store.storage().contents().is_some());
    }

    #[test]
    fn corrupt_storage_is_treated_as_empty() {
        let store = SessionStore::load(MemoryStorage::with_contents("{not json"));
        assert_eq!(store.len(), 1);
        assert!(store.active_session().unwrap().is_greeting_only());
    }

    #[test]
    fn create_prepends_and_activates() {
        let mut store = SessionStore::load(MemoryStorage::new());
        let first = store.active_id().to_string();
        let second = store.create_session();

        assert_eq!(store.active_id(), second.id);
        let ids: Vec<_> = store.sessions().map(|s| s.id.clone()).collect();
        assert_eq!(ids, vec![second.id.clone(), first]);
        assert_eq!(second.name, "Chat 2");
    }

    #[test]
    fn deleting_active_session_activates_most_recent() {
        let mut store = SessionStore::load(MemoryStorage::new());
        let oldest = store.active_id().to_string();
        let middle = store.create_session().id;
        let newest = store.create_session().id;

        store.delete_session(&newest).unwrap();
        assert_eq!(store.active_id(), middle);

        store.set_active(&oldest).unwrap();
        store.delete_session(&middle).unwrap();
        assert_eq!(store.active_id(), oldest);
    }

    #[test]
    fn unknown_session_errors() {
        let mut store = SessionStore::load(MemoryStorage::new());
        assert!(store.delete_session("nope").unwrap_err().is_not_found());
        assert!(store.set_active("nope").is_err());
        assert!(store.update_messages("nope", Vec::new()).is_err());
    }

    #[test]
    fn rename_via_explicit_call() {
        let mut store = SessionStore::load(MemoryStorage::new());
        let id = store.active_id().to_string();
        let messages = vec![ChatMessage::assistant("hi"), ChatMessage::user("tell me a joke")];

        let name = store.rename_from_first_user_message(&id, &messages).unwrap();
        assert_eq!(name.as_deref(), Some("tell me a joke"));
        assert_eq!(store.get(&id).unwrap().name, "tell me a joke");

        let none = store.rename_from_first_user_message(&id, &[ChatMessage::assistant("x")]).unwrap();
        assert_eq!(none, None);
    }
}
