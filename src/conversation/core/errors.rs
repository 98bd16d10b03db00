//! Error types for the conversation store.

use thiserror::Error;

use crate::conversation::core::ids::{ConversationId, MessageId};
use crate::conversation::core::role::Role;

/// Conversation store error type.
#[derive(Debug, Error)]
pub enum ConversationError {
    /// No conversation with this id exists.
    #[error("conversation {0} not found")]
    ConversationNotFound(ConversationId),
    /// No live message with this id exists in the conversation.
    #[error("message {0} not found")]
    MessageNotFound(MessageId),
    /// The operation targeted a message of the wrong role.
    #[error("message {message_id} has role {actual}, expected {expected}")]
    InvalidRole {
        /// Targeted message.
        message_id: MessageId,
        /// Role the operation requires.
        expected: Role,
        /// Role the message actually has.
        actual: Role,
    },
    /// Requested version number is outside `1..=available`.
    #[error("message {message_id} has no version {requested} (available: {available})")]
    InvalidVersion {
        /// Targeted message.
        message_id: MessageId,
        /// Version number that was asked for.
        requested: u32,
        /// Number of versions the message has.
        available: usize,
    },
    /// A bot message has no user message before it to answer again.
    #[error("no user message precedes bot message {0}")]
    MissingPrompt(MessageId),
    /// The stored revision no longer matches the one the aggregate was loaded at.
    #[error("conversation {conversation_id} was modified concurrently (expected revision {expected_revision})")]
    ConcurrentModification {
        /// Conversation being saved.
        conversation_id: ConversationId,
        /// Revision the caller loaded.
        expected_revision: u64,
    },
    /// A stored document could not be interpreted.
    #[error("corrupt conversation document: {0}")]
    CorruptDocument(String),
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// HTTP client error from Rig.
    #[error("http client error: {0}")]
    HttpClient(#[from] rig::http_client::Error),
    /// Completion error.
    #[error("completion error: {0}")]
    Completion(#[from] rig::completion::CompletionError),
    /// Answer or title provider failure not covered above.
    #[error("provider error: {0}")]
    Provider(String),
}

impl ConversationError {
    /// Whether the referenced conversation or message does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ConversationNotFound(_) | Self::MessageNotFound(_)
        )
    }

    /// Whether the document store failed to load or save.
    #[must_use]
    pub const fn is_persistence_failure(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(_) | Self::TokioSqlite(_) | Self::Serialization(_) | Self::CorruptDocument(_)
        )
    }

    /// Whether reloading the conversation and repeating the operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }
}

/// Convenience result alias for conversation operations.
pub type ConversationResult<T> = Result<T, ConversationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let missing = ConversationError::MessageNotFound(MessageId::new());
        assert!(missing.is_not_found());
        assert!(!missing.is_retryable());

        let conflict = ConversationError::ConcurrentModification {
            conversation_id: ConversationId::new(),
            expected_revision: 3,
        };
        assert!(conflict.is_retryable());
        assert!(!conflict.is_persistence_failure());

        let corrupt = ConversationError::CorruptDocument("bad".to_string());
        assert!(corrupt.is_persistence_failure());
    }

    #[test]
    fn test_error_messages_carry_detail() {
        let message_id = MessageId::new();
        let err = ConversationError::InvalidVersion {
            message_id,
            requested: 99,
            available: 2,
        };
        let text = err.to_string();
        assert!(text.contains(&message_id.to_string()));
        assert!(text.contains("99"));
    }
}
