//! In-process conversation store.

use dashmap::DashMap;

use crate::conversation::core::errors::{ConversationError, ConversationResult};
use crate::conversation::core::ids::{ConversationId, UserId};
use crate::conversation::model::conversation::Conversation;
use crate::conversation::storage::conversation_store::{
    ConversationStore, ConversationSummary, StoreFuture,
};

/// `DashMap`-backed store with the same revision check as the `SQLite` one.
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: DashMap<ConversationId, Conversation>,
}

impl InMemoryConversationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored conversations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// Whether the store holds no conversations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn load(&self, id: ConversationId) -> StoreFuture<'_, ConversationResult<Conversation>> {
        Box::pin(async move {
            self.conversations
                .get(&id)
                .map(|entry| entry.value().clone())
                .ok_or(ConversationError::ConversationNotFound(id))
        })
    }

    fn save<'a>(
        &'a self,
        conversation: &'a mut Conversation,
    ) -> StoreFuture<'a, ConversationResult<ConversationId>> {
        Box::pin(async move {
            let expected = conversation.revision();
            let Some(id) = conversation.id() else {
                let id = ConversationId::new();
                conversation.assign_identity(id, 1);
                self.conversations.insert(id, conversation.clone());
                return Ok(id);
            };

            let mut stored = self.conversations.get_mut(&id).ok_or(
                ConversationError::ConcurrentModification {
                    conversation_id: id,
                    expected_revision: expected,
                },
            )?;
            if stored.revision() != expected {
                return Err(ConversationError::ConcurrentModification {
                    conversation_id: id,
                    expected_revision: expected,
                });
            }

            conversation.assign_identity(id, expected + 1);
            *stored = conversation.clone();
            Ok(id)
        })
    }

    fn delete(&self, id: ConversationId) -> StoreFuture<'_, ConversationResult<()>> {
        Box::pin(async move {
            self.conversations
                .remove(&id)
                .map(|_| ())
                .ok_or(ConversationError::ConversationNotFound(id))
        })
    }

    fn list_for_user(
        &self,
        user_id: UserId,
        include_archived: bool,
    ) -> StoreFuture<'_, ConversationResult<Vec<ConversationSummary>>> {
        Box::pin(async move {
            let mut summaries: Vec<ConversationSummary> = self
                .conversations
                .iter()
                .filter(|entry| entry.user_id() == user_id)
                .filter(|entry| include_archived || !entry.is_archived())
                .map(|entry| ConversationSummary::from(entry.value()))
                .collect();
            summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            Ok(summaries)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::model::message::NewMessage;

    #[tokio::test]
    async fn test_first_save_assigns_identity() {
        let store = InMemoryConversationStore::new();
        let mut conversation = Conversation::new(UserId::new(), "Hello", None);
        assert!(conversation.id().is_none());

        let id = store.save(&mut conversation).await.unwrap();
        assert_eq!(conversation.id(), Some(id));
        assert_eq!(conversation.revision(), 1);
        assert_eq!(store.load(id).await.unwrap(), conversation);
    }

    #[tokio::test]
    async fn test_stale_save_is_rejected() {
        let store = InMemoryConversationStore::new();
        let mut conversation = Conversation::new(UserId::new(), "", None);
        let id = store.save(&mut conversation).await.unwrap();

        let mut first = store.load(id).await.unwrap();
        let mut second = store.load(id).await.unwrap();
        first.add_message(NewMessage::user("first writer"));
        second.add_message(NewMessage::user("second writer"));

        store.save(&mut first).await.unwrap();
        let err = store.save(&mut second).await.unwrap_err();
        assert!(err.is_retryable());

        let stored = store.load(id).await.unwrap();
        assert_eq!(stored.messages()[0].content(), "first writer");
        assert_eq!(stored.revision(), 2);
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let store = InMemoryConversationStore::new();
        let user = UserId::new();
        let mut kept = Conversation::new(user, "kept", None);
        let mut archived = Conversation::new(user, "archived", None);
        archived.set_archived(true);
        let mut other = Conversation::new(UserId::new(), "other", None);
        store.save(&mut kept).await.unwrap();
        let archived_id = store.save(&mut archived).await.unwrap();
        store.save(&mut other).await.unwrap();

        let visible = store.list_for_user(user, false).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].title, "kept");
        assert_eq!(store.list_for_user(user, true).await.unwrap().len(), 2);

        store.delete(archived_id).await.unwrap();
        assert!(store.load(archived_id).await.unwrap_err().is_not_found());
        assert!(store.delete(archived_id).await.unwrap_err().is_not_found());
        assert_eq!(store.len(), 2);
    }
}
