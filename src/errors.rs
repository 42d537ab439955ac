use thiserror::Error;

/// Top-level client error.
/// All variants carry a human-readable message for display/logging; none of them is fatal to
/// the client, every failure path ends up as a visible message in the conversation.
#[derive(Debug, Error)]
pub enum ChatError {
    // ── Transport errors ─────────────────────────────────────────────────────
    #[error("Inference server unreachable at {host}: {message}")]
    ServerUnavailable { host: String, message: String },

    #[error("Inference server returned status {status}: {body}")]
    ServerStatus { status: u16, body: String },

    #[error("Request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("Stream read failed: {0}")]
    StreamRead(String),

    // ── Storage errors ───────────────────────────────────────────────────────
    #[error("Session storage failed: {0}")]
    Storage(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Validation errors ────────────────────────────────────────────────────
    #[error("Field '{field_name}' cannot be empty")]
    EmptyField { field_name: String },

    #[error("Field '{field_name}' exceeds max length of {max_length} (actual: {actual_length})")]
    FieldTooLong { field_name: String, max_length: usize, actual_length: usize },

    // ── Session errors ───────────────────────────────────────────────────────
    #[error("Session '{id}' not found")]
    SessionNotFound { id: String },
}

impl ChatError {
    pub fn storage(message: impl std::fmt::Display) -> Self {
        ChatError::Storage(message.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ChatError::SessionNotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ChatError::EmptyField { .. } | ChatError::FieldTooLong { .. })
    }

    /// Failures that mean the server could not be talked to at all, as opposed to a server
    /// that answered with an error.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ChatError::ServerUnavailable { .. } | ChatError::Timeout { .. } | ChatError::StreamRead(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_helpers() {
        let err = ChatError::Timeout { endpoint: "/api/health".to_string() };
        assert!(err.is_transport());
        assert!(!err.is_validation());

        let err = ChatError::ServerStatus { status: 500, body: "boom".to_string() };
        assert!(!err.is_transport());
        assert_eq!(err.to_string(), "Inference server returned status 500: boom");

        let err = ChatError::SessionNotFound { id: "abc".to_string() };
        assert!(err.is_not_found());
    }
}
