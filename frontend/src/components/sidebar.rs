use leptos::prelude::*;

use crate::state::AppState;

/// Sidebar listing chat sessions, with "New Chat" and per-session delete.
#[component]
pub fn Sidebar() -> impl IntoView {
    let state = expect_context::<AppState>();

    let sessions = move || {
        state.sessions.with(|store| {
            store
                .sessions()
                .map(|s| (s.id.clone(), s.name.clone()))
                .collect::<Vec<_>>()
        })
    };

    view! {
        <aside class="sidebar">
            <div class="sidebar-header">
                <h2>"ThinkChat"</h2>
                <button class="new-chat-btn" on:click=move |_| state.new_session()>
                    "+ New Chat"
                </button>
            </div>
            <div class="conversation-list">
                <For
                    each=sessions
                    key=|(id, name)| (id.clone(), name.clone())
                    let:session
                >
                    {
                        let (id, name) = session;
                        let id_active = id.clone();
                        let id_streaming = id.clone();
                        let id_click = id.clone();
                        view! {
                            <div
                                class="conversation-item"
                                class:active=move || state.active_id() == id_active
                                on:click=move |_| state.select_session(id_click.clone())
                            >
                                <span class="conversation-title">{name}</span>
                                {move || {
                                    state
                                        .streaming
                                        .with(|set| set.contains(&id_streaming))
                                        .then(|| view! { <span class="typing-dot">"●"</span> })
                                }}
                                <button
                                    class="delete-btn"
                                    title="Delete chat"
                                    on:click=move |ev| {
                                        ev.stop_propagation();
                                        state.delete_session(id.clone());
                                    }
                                >
                                    "×"
                                </button>
                            </div>
                        }
                    }
                </For>
            </div>
        </aside>
    }
}
