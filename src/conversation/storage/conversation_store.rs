//! Persistence contract for whole-conversation documents.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::core::errors::ConversationResult;
use crate::conversation::core::ids::{ConversationId, UserId};
use crate::conversation::model::conversation::Conversation;

/// Boxed future type for conversation store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Listing entry for a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation id.
    pub id: ConversationId,
    /// Display title.
    pub title: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
    /// Number of live messages.
    pub message_count: usize,
    /// Archived flag.
    pub is_archived: bool,
}

impl From<&Conversation> for ConversationSummary {
    fn from(conversation: &Conversation) -> Self {
        Self {
            id: conversation.id().unwrap_or_default(),
            title: conversation.title().to_string(),
            created_at: conversation.created_at(),
            updated_at: conversation.updated_at(),
            message_count: conversation.messages().len(),
            is_archived: conversation.is_archived(),
        }
    }
}

/// Whole-document conversation store.
///
/// `save` is a compare-and-swap on the aggregate revision: it succeeds only if
/// the stored revision still equals the one the aggregate was loaded at.
pub trait ConversationStore: Send + Sync {
    /// Load a conversation.
    ///
    /// # Errors
    /// `ConversationNotFound` if absent, or a persistence error.
    fn load(&self, id: ConversationId) -> StoreFuture<'_, ConversationResult<Conversation>>;

    /// Persist the whole aggregate, assigning an id on first save.
    ///
    /// On success the aggregate's id and revision are updated in place.
    ///
    /// # Errors
    /// `ConcurrentModification` if the stored revision moved, or a persistence error.
    fn save<'a>(
        &'a self,
        conversation: &'a mut Conversation,
    ) -> StoreFuture<'a, ConversationResult<ConversationId>>;

    /// Permanently delete a conversation.
    ///
    /// # Errors
    /// `ConversationNotFound` if absent, or a persistence error.
    fn delete(&self, id: ConversationId) -> StoreFuture<'_, ConversationResult<()>>;

    /// List a user's conversations, most recently updated first.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_for_user(
        &self,
        user_id: UserId,
        include_archived: bool,
    ) -> StoreFuture<'_, ConversationResult<Vec<ConversationSummary>>>;
}
