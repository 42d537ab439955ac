//! Client core for a locally hosted inference server: streaming thought/response decoding,
//! multi-session persistence and server health polling.
//!
//! The core builds for the browser with `default-features = false`; the `native` feature
//! adds the reqwest client, the tokio health monitor and file-backed session storage.

pub mod chat;
pub mod errors;
pub mod health;
pub mod models;
pub mod session;
pub mod stream;

#[cfg(feature = "native")]
pub mod client;
#[cfg(feature = "native")]
pub mod config;

pub use chat::{ChatTurn, TurnSettings};
pub use errors::ChatError;
pub use health::{HealthState, HealthStatus};
pub use models::{ChatMessage, MessageContent, MessageRole, Session, ThoughtResponse};
pub use session::{SessionStorage, SessionStore};

#[cfg(feature = "native")]
pub use client::InferenceClient;
#[cfg(feature = "native")]
pub use config::ClientConfig;
