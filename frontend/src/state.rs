use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use leptos::prelude::*;
use leptos::task::spawn_local;
use thinkchat::models::GenerateRequest;
use thinkchat::stream::{DEFAULT_MAX_THINKING_TIME, clamp_thinking_time};
use thinkchat::{ChatMessage, ChatTurn, HealthState, HealthStatus, SessionStore, TurnSettings};

use crate::api;
use crate::storage::LocalStorage;

/// Shared application state, provided via Leptos context.
#[derive(Clone, Copy)]
pub struct AppState {
    // --- Read signals (for components to subscribe to) ---
    pub sessions: ReadSignal<SessionStore<LocalStorage>>,
    pub health: ReadSignal<HealthState>,
    /// Ids of sessions with a request in flight.
    pub streaming: ReadSignal<HashSet<String>>,
    pub max_thinking: ReadSignal<Duration>,
    pub error: ReadSignal<Option<String>>,

    // --- Write signals (for mutating state) ---
    pub set_sessions: WriteSignal<SessionStore<LocalStorage>>,
    pub set_health: WriteSignal<HealthState>,
    pub set_streaming: WriteSignal<HashSet<String>>,
    pub set_max_thinking: WriteSignal<Duration>,
    pub set_error: WriteSignal<Option<String>>,
}

impl AppState {
    /// Restore saved sessions, then create the state and provide it in the current context.
    pub fn provide() -> Self {
        let (sessions, set_sessions) = signal(SessionStore::load(LocalStorage));
        let (health, set_health) = signal(HealthState::default());
        let (streaming, set_streaming) = signal(HashSet::<String>::new());
        let (max_thinking, set_max_thinking) = signal(DEFAULT_MAX_THINKING_TIME);
        let (error, set_error) = signal(None::<String>);

        let state = Self {
            sessions,
            health,
            streaming,
            max_thinking,
            error,
            set_sessions,
            set_health,
            set_streaming,
            set_max_thinking,
            set_error,
        };

        provide_context(state);
        state
    }

    // ── Sessions ──────────────────────────────────────────────────────────────

    pub fn active_id(&self) -> String {
        self.sessions.with(|store| store.active_id().to_string())
    }

    /// Whether the active session has a request in flight (tracked).
    pub fn active_is_streaming(&self) -> bool {
        let id = self.active_id();
        self.streaming.with(|set| set.contains(&id))
    }

    pub fn select_session(&self, id: String) {
        self.set_error.set(None);
        self.set_sessions.update(|store| {
            if let Err(e) = store.set_active(&id) {
                log::warn!("Cannot select session: {e}");
            }
        });
    }

    pub fn new_session(&self) {
        self.set_error.set(None);
        self.set_sessions.update(|store| {
            store.create_session();
        });
    }

    pub fn delete_session(&self, id: String) {
        self.set_sessions.update(|store| {
            if let Err(e) = store.delete_session(&id) {
                log::warn!("Cannot delete session: {e}");
            }
        });
    }

    pub fn set_thinking_secs(&self, secs: u64) {
        self.set_max_thinking.set(clamp_thinking_time(Duration::from_secs(secs)));
    }

    /// Write a message list to its session. Returns false when the session is gone.
    fn apply_messages(&self, session_id: &str, messages: &[ChatMessage]) -> bool {
        let mut applied = false;
        self.set_sessions.update(|store| match store.update_messages(session_id, messages.to_vec()) {
            Ok(()) => applied = true,
            Err(e) => log::warn!("Dropping update: {e}"),
        });
        applied
    }

    // ── Health ────────────────────────────────────────────────────────────────

    pub fn is_ready(&self) -> bool {
        self.health.with(|h| h.status.is_ready())
    }

    pub fn record_health(&self, status: HealthStatus) {
        self.set_health.update(|health| {
            if let Some(ready) = health.record(status) {
                log::info!("Inference server readiness changed: {status} (ready: {ready})");
            }
        });
    }

    /// Show "checking" until the next poll reports.
    pub fn check_health_now(&self) {
        self.set_health.update(HealthState::request_check);
    }

    // ── Generation ────────────────────────────────────────────────────────────

    /// Send a prompt on the active session and stream the reply into it.
    pub fn send_message(&self, text: String) {
        let Some((session_id, history)) = self.sessions.with_untracked(|store| {
            store.active_session().map(|s| (s.id.clone(), s.messages.clone()))
        }) else {
            return;
        };
        if self.streaming.with_untracked(|set| set.contains(&session_id)) {
            return;
        }

        let settings = TurnSettings {
            max_thinking_time: self.max_thinking.get_untracked(),
            ..TurnSettings::default()
        };
        let (turn, request) = match ChatTurn::begin(&session_id, &history, &text, &settings, Utc::now()) {
            Ok(started) => started,
            Err(e) => {
                self.set_error.set(Some(e.to_string()));
                return;
            }
        };
        if !self.apply_messages(&session_id, turn.messages()) {
            return;
        }

        self.set_error.set(None);
        self.set_streaming.update(|set| {
            set.insert(session_id.clone());
        });

        let state = *self;
        spawn_local(async move {
            state.stream_turn(turn, request).await;
            state.set_streaming.update(|set| {
                set.remove(&session_id);
            });
        });
    }

    /// Drive one turn to completion. Updates go to the session that started it; if that
    /// session disappears the reader is released on the next read.
    async fn stream_turn(self, mut turn: ChatTurn, request: GenerateRequest) {
        let session_id = turn.session_id().to_string();

        let reader = match api::open_stream(&request).await {
            Ok(reader) => reader,
            Err(e) => {
                log::error!("Generation request for session {session_id} failed: {e}");
                self.apply_messages(&session_id, &turn.fail(&e));
                return;
            }
        };

        let mut abandoned = false;
        loop {
            if abandoned || self.sessions.with_untracked(|store| !store.contains(&session_id)) {
                log::info!("Releasing stream for session {session_id}");
                reader.release();
                return;
            }
            match reader.next_chunk().await {
                Ok(Some(bytes)) => {
                    turn.feed(&bytes, Utc::now(), &mut |messages: &[ChatMessage]| {
                        abandoned |= !self.apply_messages(&session_id, messages);
                    });
                    if turn.is_done() {
                        reader.release();
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::error!("Stream for session {session_id} broke off: {e}");
                    self.apply_messages(&session_id, &turn.fail(&e));
                    return;
                }
            }
        }

        self.apply_messages(&session_id, &turn.finish(Utc::now()));
    }
}
