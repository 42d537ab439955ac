use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use thinkchat::health::HealthMonitor;
use thinkchat::session::FileStorage;
use thinkchat::{
    ChatMessage, ChatTurn, ClientConfig, InferenceClient, MessageContent, SessionStore,
};

const HELP: &str = "commands: /new  /list  /switch N  /delete N  /health  /help  /quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    // Logs go to stderr so they don't interleave with streamed output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "thinkchat=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::from_env();
    info!("Using inference server at {}", config.api_base);

    // ── Sessions ──────────────────────────────────────────────────────────────
    let mut store = SessionStore::load(FileStorage::new(&config.sessions_file));

    // ── Health polling ────────────────────────────────────────────────────────
    let client = InferenceClient::new(&config.api_base);
    let ready = Arc::new(AtomicBool::new(false));
    let monitor = HealthMonitor::start(client.clone(), config.health_interval, {
        let ready = ready.clone();
        move |is_ready| ready.store(is_ready, Ordering::Release)
    });

    println!("{HELP}");
    print_active(&store);

    // ── REPL ──────────────────────────────────────────────────────────────────
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt_marker();
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match Command::parse(line) {
            Command::Quit => break,
            Command::Help => println!("{HELP}"),
            Command::New => {
                store.create_session();
                print_active(&store);
            }
            Command::List => print_sessions(&store),
            Command::Switch(n) => match nth_session_id(&store, n) {
                Some(id) => {
                    if let Err(e) = store.set_active(&id) {
                        println!("{e}");
                    }
                    print_active(&store);
                }
                None => println!("No session #{n}"),
            },
            Command::Delete(n) => match nth_session_id(&store, n) {
                Some(id) => {
                    if let Err(e) = store.delete_session(&id) {
                        println!("{e}");
                    }
                    print_active(&store);
                }
                None => println!("No session #{n}"),
            },
            Command::Health => {
                monitor.check_now();
                let state = monitor.current();
                let suffix = if state.checking { " (checking...)" } else { "" };
                println!("{}{suffix}", state.status);
            }
            Command::Unknown(cmd) => println!("Unknown command {cmd}. {HELP}"),
            Command::Prompt(text) => {
                if !ready.load(Ordering::Acquire) {
                    println!("Server not ready ({}); try again shortly.", monitor.current().status);
                    continue;
                }
                send_prompt(&client, &config, &mut store, text).await;
            }
        }
    }

    monitor.stop();
    info!("Bye");
    Ok(())
}

/// Run one streaming turn on the active session, printing deltas as they arrive.
async fn send_prompt(
    client: &InferenceClient,
    config: &ClientConfig,
    store: &mut SessionStore<FileStorage>,
    text: &str,
) {
    let Some(session) = store.active_session() else {
        warn!("No active session");
        return;
    };
    let session_id = session.id.clone();
    let (turn, request) = match ChatTurn::begin(
        &session_id,
        &session.messages,
        text,
        &config.turn_settings(),
        Utc::now(),
    ) {
        Ok(started) => started,
        Err(e) => {
            println!("{e}");
            return;
        }
    };
    if let Err(e) = store.update_messages(&session_id, turn.messages().to_vec()) {
        warn!("Failed to record prompt: {e}");
        return;
    }

    // Ctrl-C while streaming releases the stream on its next read
    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let mut printer = DeltaPrinter::default();
    let messages = client
        .stream_turn(
            turn,
            &request,
            || cancel.is_cancelled(),
            |messages| {
                printer.show(messages);
                if let Err(e) = store.update_messages(&session_id, messages.to_vec()) {
                    warn!("Failed to update session {session_id}: {e}");
                }
            },
        )
        .await;
    watcher.abort();

    printer.show(&messages);
    println!();
    if let Err(e) = store.update_messages(&session_id, messages) {
        warn!("Failed to save reply: {e}");
    }
}

enum Command<'a> {
    New,
    List,
    Switch(usize),
    Delete(usize),
    Health,
    Help,
    Quit,
    Unknown(&'a str),
    Prompt(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        if !line.starts_with('/') {
            return Command::Prompt(line);
        }
        let mut parts = line.split_whitespace();
        let cmd = parts.next().unwrap_or(line);
        let index = parts.next().and_then(|n| n.parse::<usize>().ok());
        match (cmd, index) {
            ("/new", _) => Command::New,
            ("/list", _) => Command::List,
            ("/switch", Some(n)) => Command::Switch(n),
            ("/delete", Some(n)) => Command::Delete(n),
            ("/health", _) => Command::Health,
            ("/help", _) => Command::Help,
            ("/quit" | "/exit", _) => Command::Quit,
            _ => Command::Unknown(cmd),
        }
    }
}

/// Prints only what changed since the last call: new thought text, then new response text.
#[derive(Default)]
struct DeltaPrinter {
    thought: String,
    response: String,
}

impl DeltaPrinter {
    fn show(&mut self, messages: &[ChatMessage]) {
        let Some(last) = messages.last() else { return };
        let mut out = std::io::stdout().lock();
        match &last.content {
            MessageContent::Thought(content) => {
                if self.thought.is_empty() && !content.thought.is_empty() {
                    let _ = write!(out, "(thinking) ");
                }
                emit(&mut out, &mut self.thought, &content.thought);
                if self.response.is_empty() && !content.response.is_empty() {
                    let _ = write!(out, "\n\n> ");
                }
                emit(&mut out, &mut self.response, &content.response);
            }
            MessageContent::Text(text) => {
                if self.response.is_empty() {
                    let _ = write!(out, "> ");
                }
                emit(&mut out, &mut self.response, text);
            }
        }
        let _ = out.flush();
    }
}

fn emit(out: &mut impl Write, printed: &mut String, current: &str) {
    if printed.as_str() == current {
        return;
    }
    let _ = match current.strip_prefix(printed.as_str()) {
        Some(delta) => write!(out, "{delta}"),
        // Replaced rather than extended (e.g. a provisional answer superseded)
        None => write!(out, "\n{current}"),
    };
    *printed = current.to_string();
}

fn nth_session_id<S: thinkchat::SessionStorage>(store: &SessionStore<S>, n: usize) -> Option<String> {
    n.checked_sub(1)
        .and_then(|i| store.sessions().nth(i))
        .map(|s| s.id.clone())
}

fn print_sessions<S: thinkchat::SessionStorage>(store: &SessionStore<S>) {
    for (i, session) in store.sessions().enumerate() {
        let marker = if session.id == store.active_id() { "*" } else { " " };
        println!(
            "{marker} {:>2}. {}  ({} messages, {})",
            i + 1,
            session.name,
            session.messages.len(),
            session.created_at.format("%Y-%m-%d %H:%M")
        );
    }
}

fn print_active<S: thinkchat::SessionStorage>(store: &SessionStore<S>) {
    let Some(session) = store.active_session() else { return };
    println!("── {} ──", session.name);
    for message in &session.messages {
        match &message.content {
            MessageContent::Text(text) => println!("[{}] {text}", message.role),
            MessageContent::Thought(content) => {
                if !content.thought.is_empty() {
                    println!("[{}] (thinking) {}", message.role, content.thought);
                }
                println!("[{}] {}", message.role, content.response);
            }
        }
    }
}

fn prompt_marker() {
    let mut out = std::io::stdout().lock();
    let _ = write!(out, "\n you: ");
    let _ = out.flush();
}
