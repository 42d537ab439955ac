use leptos::ev;
use leptos::prelude::*;
use thinkchat::stream::state::{MAX_MAX_THINKING_TIME, MIN_MAX_THINKING_TIME};
use thinkchat::{ChatMessage, HealthStatus, MessageContent, MessageRole, ThoughtResponse};

use crate::state::AppState;

const NO_RESPONSE: &str = "No response generated. Please try again.";

/// Main chat area: server status, the active session's messages, and input.
#[component]
pub fn ChatArea() -> impl IntoView {
    let state = expect_context::<AppState>();

    view! {
        <main class="chat-area">
            // Error banner
            {move || {
                state.error.get().map(|err| {
                    view! {
                        <div class="error-banner">{err}</div>
                    }
                })
            }}

            // Chat header
            <div class="chat-header">
                <span class="session-name">
                    {move || {
                        state.sessions.with(|store| {
                            store.active_session().map(|s| s.name.clone()).unwrap_or_default()
                        })
                    }}
                </span>
                <ThinkingLimit />
                <StatusBadge />
            </div>

            // Messages
            <div class="messages-container">
                {move || {
                    let messages = state.sessions.with(|store| {
                        store.active_session().map(|s| s.messages.clone()).unwrap_or_default()
                    });
                    let streaming = state.active_is_streaming();
                    let last = messages.len().saturating_sub(1);
                    messages
                        .into_iter()
                        .enumerate()
                        .map(|(i, message)| {
                            view! { <MessageBubble message=message in_progress={streaming && i == last} /> }
                        })
                        .collect_view()
                }}
            </div>

            // Input area
            <ChatInput />
        </main>
    }
}

/// Server status with a manual re-check button.
#[component]
fn StatusBadge() -> impl IntoView {
    let state = expect_context::<AppState>();

    let css_class = move || match state.health.get().status {
        HealthStatus::Online => "status-badge online",
        HealthStatus::ModelLoading | HealthStatus::Checking => "status-badge loading",
        HealthStatus::Offline | HealthStatus::Error => "status-badge offline",
    };

    view! {
        <div class=css_class>
            <span class="status-label">{move || state.health.get().status.label()}</span>
            <button
                class="check-btn"
                on:click=move |_| state.check_health_now()
                disabled=move || state.health.get().checking
            >
                {move || if state.health.get().checking { "Checking…" } else { "Check" }}
            </button>
        </div>
    }
}

/// Slider for the thinking time budget.
#[component]
fn ThinkingLimit() -> impl IntoView {
    let state = expect_context::<AppState>();

    view! {
        <label class="thinking-limit">
            {move || format!("Max thinking: {}s", state.max_thinking.get().as_secs())}
            <input
                type="range"
                min=MIN_MAX_THINKING_TIME.as_secs().to_string()
                max=MAX_MAX_THINKING_TIME.as_secs().to_string()
                prop:value=move || state.max_thinking.get().as_secs().to_string()
                on:input=move |ev| {
                    if let Ok(secs) = event_target_value(&ev).parse::<u64>() {
                        state.set_thinking_secs(secs);
                    }
                }
            />
        </label>
    }
}

/// A single chat message bubble. Assistant replies show the reasoning above the answer.
#[component]
fn MessageBubble(message: ChatMessage, in_progress: bool) -> impl IntoView {
    let css_class = match message.role {
        MessageRole::User => "message user",
        MessageRole::Assistant => "message assistant",
    };
    let label = message.role.as_str();

    match message.content {
        MessageContent::Text(text) => view! {
            <div class=css_class>
                <div class="role-label">{label}</div>
                <div>{text}</div>
            </div>
        }
        .into_any(),
        MessageContent::Thought(ThoughtResponse { thought, response }) => {
            let response = if response.is_empty() && !in_progress {
                NO_RESPONSE.to_string()
            } else {
                response
            };
            view! {
                <div class=css_class>
                    <div class="role-label">{label}</div>
                    {(!thought.is_empty()).then(|| view! {
                        <div class="thought-process">
                            <div class="thought-label">
                                {if in_progress { "Thinking Process (...)" } else { "Thinking Process" }}
                            </div>
                            <div class="thought-text">{thought}</div>
                        </div>
                    })}
                    <div class="response" class:streaming-cursor=in_progress>{response}</div>
                </div>
            }
            .into_any()
        }
    }
}

/// Chat input form with textarea and send button.
#[component]
fn ChatInput() -> impl IntoView {
    let state = expect_context::<AppState>();
    let (input, set_input) = signal(String::new());

    let is_blocked = move || state.active_is_streaming() || !state.is_ready();

    let send = move || {
        let text = input.get().trim().to_string();
        if text.is_empty() || is_blocked() {
            return;
        }
        set_input.set(String::new());
        state.send_message(text);
    };

    let on_keydown = move |ev: ev::KeyboardEvent| {
        if ev.key() == "Enter" && !ev.shift_key() {
            ev.prevent_default();
            send();
        }
    };

    let placeholder = move || {
        if state.is_ready() {
            "Type a message… (Enter to send, Shift+Enter for newline)"
        } else {
            "Waiting for the server…"
        }
    };

    view! {
        <div class="input-area">
            <div class="input-row">
                <textarea
                    rows="1"
                    placeholder=placeholder
                    prop:value=input
                    on:input=move |ev| {
                        set_input.set(event_target_value(&ev));
                    }
                    on:keydown=on_keydown
                    disabled=is_blocked
                />
                <button
                    class="send-btn"
                    on:click=move |_| send()
                    disabled=move || is_blocked() || input.get().trim().is_empty()
                >
                    {move || if state.active_is_streaming() { "Sending…" } else { "Send" }}
                </button>
            </div>
        </div>
    }
}
