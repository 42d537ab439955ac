//! Conversation threads and their persistence.

pub mod storage;
pub mod store;

#[cfg(feature = "native")]
pub use storage::FileStorage;
pub use storage::{MemoryStorage, SessionStorage};
pub use store::{session_name_from, SessionStore};
