//! Load, mutate, save orchestration over a conversation store.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::conversation::core::errors::ConversationResult;
use crate::conversation::core::ids::{ConversationId, MessageId, UserId};
use crate::conversation::model::conversation::Conversation;
use crate::conversation::model::message::NewMessage;
use crate::conversation::model::source::Source;
use crate::conversation::model::versioning::{EditOutcome, SwitchOutcome};
use crate::conversation::storage::conversation_store::{ConversationStore, ConversationSummary};

/// Conversation operations, each one load, mutate and save.
///
/// A rejected operation or a failed save leaves the stored document as it was.
#[derive(Clone)]
pub struct ConversationService {
    store: Arc<dyn ConversationStore>,
}

impl ConversationService {
    /// Build a service over a store handle.
    #[must_use]
    pub const fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    /// Underlying store handle.
    #[must_use]
    pub const fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Create and persist an empty conversation.
    ///
    /// # Errors
    /// Returns an error if the store rejects the insert.
    pub async fn create_conversation(
        &self,
        user_id: UserId,
        title: impl Into<String>,
        age: Option<u32>,
    ) -> ConversationResult<Conversation> {
        let mut conversation = Conversation::new(user_id, title, age);
        let id = self.store.save(&mut conversation).await?;
        info!(conversation_id = %id, user_id = %user_id, "Created conversation");
        Ok(conversation)
    }

    /// Load a conversation.
    ///
    /// # Errors
    /// `ConversationNotFound` if absent, or a persistence error.
    pub async fn get_conversation(&self, id: ConversationId) -> ConversationResult<Conversation> {
        self.store.load(id).await
    }

    /// List a user's conversations, most recently updated first.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn list_conversations(
        &self,
        user_id: UserId,
        include_archived: bool,
    ) -> ConversationResult<Vec<ConversationSummary>> {
        self.store.list_for_user(user_id, include_archived).await
    }

    /// Append a message.
    ///
    /// # Errors
    /// `ConversationNotFound`, `ConcurrentModification`, or a persistence error.
    pub async fn add_message(
        &self,
        conversation_id: ConversationId,
        input: NewMessage,
    ) -> ConversationResult<MessageId> {
        self.mutate(conversation_id, "add_message", move |conversation| {
            Ok(conversation.add_message(input))
        })
        .await
    }

    /// Edit a user message, moving the following messages into history.
    ///
    /// # Errors
    /// Not-found, `InvalidRole`, `ConcurrentModification`, or a persistence error.
    pub async fn edit_message(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
        new_content: impl Into<String> + Send,
    ) -> ConversationResult<EditOutcome> {
        self.mutate(conversation_id, "edit_message", move |conversation| {
            conversation.edit_message(message_id, new_content)
        })
        .await
    }

    /// Attach a fresh bot reply after an edited user message.
    ///
    /// # Errors
    /// Not-found, `InvalidRole`, `ConcurrentModification`, or a persistence error.
    pub async fn regenerate_bot_response_after_edit(
        &self,
        conversation_id: ConversationId,
        user_message_id: MessageId,
        new_response: impl Into<String> + Send,
        sources: Option<Vec<Source>>,
    ) -> ConversationResult<MessageId> {
        self.mutate(
            conversation_id,
            "regenerate_bot_response_after_edit",
            move |conversation| {
                conversation.regenerate_bot_response_after_edit(
                    user_message_id,
                    new_response,
                    sources,
                )
            },
        )
        .await
    }

    /// Add a new version to a bot message.
    ///
    /// # Errors
    /// Not-found, `InvalidRole`, `ConcurrentModification`, or a persistence error.
    pub async fn regenerate_response(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
        new_response: impl Into<String> + Send,
        sources: Option<Vec<Source>>,
    ) -> ConversationResult<EditOutcome> {
        self.mutate(conversation_id, "regenerate_response", move |conversation| {
            conversation.regenerate_response(message_id, new_response, sources)
        })
        .await
    }

    /// Select another version of a message and restore its branch.
    ///
    /// # Errors
    /// Not-found, `InvalidVersion`, `ConcurrentModification`, or a persistence error.
    pub async fn switch_version(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
        version_number: u32,
    ) -> ConversationResult<SwitchOutcome> {
        self.mutate(conversation_id, "switch_version", move |conversation| {
            conversation.switch_version(message_id, version_number)
        })
        .await
    }

    /// Remove a message and every message after it.
    ///
    /// # Errors
    /// Not-found, `ConcurrentModification`, or a persistence error.
    pub async fn delete_message_and_following(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
    ) -> ConversationResult<usize> {
        self.mutate(
            conversation_id,
            "delete_message_and_following",
            move |conversation| conversation.delete_message_and_following(message_id),
        )
        .await
    }

    /// Rename a conversation.
    ///
    /// # Errors
    /// `ConversationNotFound`, `ConcurrentModification`, or a persistence error.
    pub async fn rename_conversation(
        &self,
        conversation_id: ConversationId,
        title: impl Into<String> + Send,
    ) -> ConversationResult<()> {
        self.mutate(conversation_id, "rename_conversation", move |conversation| {
            conversation.rename(title);
            Ok(())
        })
        .await
    }

    /// Rename only if the conversation is still untitled.
    ///
    /// Returns whether the title was applied. A save that loses a race with
    /// another writer is retried once against the reloaded conversation.
    ///
    /// # Errors
    /// `ConversationNotFound`, `ConcurrentModification`, or a persistence error.
    pub async fn rename_if_untitled(
        &self,
        conversation_id: ConversationId,
        title: &str,
    ) -> ConversationResult<bool> {
        match self.try_rename_if_untitled(conversation_id, title).await {
            Err(err) if err.is_retryable() => {
                debug!(
                    conversation_id = %conversation_id,
                    error = %err,
                    "Title rename raced another save, retrying"
                );
                self.try_rename_if_untitled(conversation_id, title).await
            }
            other => other,
        }
    }

    async fn try_rename_if_untitled(
        &self,
        conversation_id: ConversationId,
        title: &str,
    ) -> ConversationResult<bool> {
        let mut conversation = self.store.load(conversation_id).await?;
        if !conversation.title().trim().is_empty() {
            return Ok(false);
        }
        conversation.rename(title);
        self.store.save(&mut conversation).await?;
        debug!(conversation_id = %conversation_id, title, "Applied generated title");
        Ok(true)
    }

    /// Set or clear the archived flag.
    ///
    /// # Errors
    /// `ConversationNotFound`, `ConcurrentModification`, or a persistence error.
    pub async fn archive_conversation(
        &self,
        conversation_id: ConversationId,
        archived: bool,
    ) -> ConversationResult<()> {
        self.mutate(conversation_id, "archive_conversation", move |conversation| {
            conversation.set_archived(archived);
            Ok(())
        })
        .await
    }

    /// Permanently delete a conversation.
    ///
    /// # Errors
    /// `ConversationNotFound` if absent, or a persistence error.
    pub async fn delete_conversation(&self, conversation_id: ConversationId) -> ConversationResult<()> {
        self.store.delete(conversation_id).await?;
        info!(conversation_id = %conversation_id, "Deleted conversation");
        Ok(())
    }

    async fn mutate<T, F>(
        &self,
        conversation_id: ConversationId,
        operation: &'static str,
        apply: F,
    ) -> ConversationResult<T>
    where
        F: FnOnce(&mut Conversation) -> ConversationResult<T> + Send,
        T: Send,
    {
        let mut conversation = self.store.load(conversation_id).await?;

        let value = apply(&mut conversation).inspect_err(|err| {
            warn!(
                conversation_id = %conversation_id,
                operation,
                error = %err,
                "Conversation operation rejected"
            );
        })?;

        self.store.save(&mut conversation).await.inspect_err(|err| {
            warn!(
                conversation_id = %conversation_id,
                operation,
                error = %err,
                "Conversation save failed"
            );
        })?;

        debug!(
            conversation_id = %conversation_id,
            operation,
            revision = conversation.revision(),
            "Conversation updated"
        );
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::conversation::core::errors::ConversationError;
    use crate::conversation::storage::conversation_store::StoreFuture;
    use crate::conversation::storage::memory_store::InMemoryConversationStore;

    /// Store that reports a lost race on the next `conflicts` saves.
    struct ContendedStore {
        inner: InMemoryConversationStore,
        conflicts: AtomicUsize,
    }

    impl ContendedStore {
        fn new(conflicts: usize) -> Self {
            Self {
                inner: InMemoryConversationStore::new(),
                conflicts: AtomicUsize::new(conflicts),
            }
        }
    }

    impl ConversationStore for ContendedStore {
        fn load(&self, id: ConversationId) -> StoreFuture<'_, ConversationResult<Conversation>> {
            self.inner.load(id)
        }

        fn save<'a>(
            &'a self,
            conversation: &'a mut Conversation,
        ) -> StoreFuture<'a, ConversationResult<ConversationId>> {
            let contended = conversation.id().is_some()
                && self
                    .conflicts
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                    .is_ok();
            if contended {
                let conversation_id = conversation.id().unwrap();
                let expected_revision = conversation.revision();
                return Box::pin(async move {
                    Err(ConversationError::ConcurrentModification {
                        conversation_id,
                        expected_revision,
                    })
                });
            }
            self.inner.save(conversation)
        }

        fn delete(&self, id: ConversationId) -> StoreFuture<'_, ConversationResult<()>> {
            self.inner.delete(id)
        }

        fn list_for_user(
            &self,
            user_id: UserId,
            include_archived: bool,
        ) -> StoreFuture<'_, ConversationResult<Vec<ConversationSummary>>> {
            self.inner.list_for_user(user_id, include_archived)
        }
    }

    #[tokio::test]
    async fn test_rename_if_untitled_retries_once_after_conflict() {
        let service = ConversationService::new(Arc::new(ContendedStore::new(1)));
        let conversation = service.create_conversation(UserId::new(), "", None).await.unwrap();
        let id = conversation.id().unwrap();

        assert!(service.rename_if_untitled(id, "Generated").await.unwrap());
        assert_eq!(service.get_conversation(id).await.unwrap().title(), "Generated");
    }

    #[tokio::test]
    async fn test_rename_if_untitled_gives_up_after_second_conflict() {
        let service = ConversationService::new(Arc::new(ContendedStore::new(2)));
        let conversation = service.create_conversation(UserId::new(), "", None).await.unwrap();
        let id = conversation.id().unwrap();

        let err = service.rename_if_untitled(id, "Generated").await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(service.get_conversation(id).await.unwrap().title(), "");
    }

    fn service() -> ConversationService {
        ConversationService::new(Arc::new(InMemoryConversationStore::new()))
    }

    #[tokio::test]
    async fn test_edit_and_switch_persist() {
        let service = service();
        let user = UserId::new();
        let conversation = service.create_conversation(user, "", Some(8)).await.unwrap();
        let id = conversation.id().unwrap();

        let question = service.add_message(id, NewMessage::user("Why is the sky blue?")).await.unwrap();
        service
            .add_message(id, NewMessage::bot("Light scatters.").with_parent(question))
            .await
            .unwrap();

        let outcome = service.edit_message(id, question, "Why is grass green?").await.unwrap();
        assert_eq!(outcome.version, 2);
        assert_eq!(outcome.captured, 1);

        service
            .regenerate_bot_response_after_edit(id, question, "Chlorophyll.", None)
            .await
            .unwrap();
        let stored = service.get_conversation(id).await.unwrap();
        assert_eq!(stored.messages().len(), 2);
        assert_eq!(stored.messages()[1].content(), "Chlorophyll.");

        let switched = service.switch_version(id, question, 1).await.unwrap();
        assert_eq!(switched.restored, 1);
        let stored = service.get_conversation(id).await.unwrap();
        assert_eq!(stored.messages()[0].content(), "Why is the sky blue?");
        assert_eq!(stored.messages()[1].content(), "Light scatters.");
    }

    #[tokio::test]
    async fn test_rejected_operation_is_not_saved() {
        let service = service();
        let conversation = service.create_conversation(UserId::new(), "", None).await.unwrap();
        let id = conversation.id().unwrap();
        let reply = service.add_message(id, NewMessage::bot("Hi there")).await.unwrap();
        let before = service.get_conversation(id).await.unwrap();

        let err = service.edit_message(id, reply, "nope").await.unwrap_err();
        assert!(matches!(err, ConversationError::InvalidRole { .. }));
        let err = service.switch_version(id, reply, 7).await.unwrap_err();
        assert!(matches!(err, ConversationError::InvalidVersion { .. }));

        let after = service.get_conversation(id).await.unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_unknown_conversation() {
        let service = service();
        let err = service
            .add_message(ConversationId::new(), NewMessage::user("hello"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let service = service();
        let user = UserId::new();
        let first = service.create_conversation(user, "", None).await.unwrap();
        let second = service.create_conversation(user, "Named", None).await.unwrap();
        let first_id = first.id().unwrap();
        let second_id = second.id().unwrap();

        assert!(service.rename_if_untitled(first_id, "Generated").await.unwrap());
        assert!(!service.rename_if_untitled(second_id, "Ignored").await.unwrap());
        service.rename_conversation(second_id, "Renamed").await.unwrap();
        service.archive_conversation(first_id, true).await.unwrap();

        let visible = service.list_conversations(user, false).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].title, "Renamed");

        let all = service.list_conversations(user, true).await.unwrap();
        assert!(all.iter().any(|s| s.title == "Generated" && s.is_archived));

        service.delete_conversation(first_id).await.unwrap();
        assert!(service.get_conversation(first_id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_regenerate_and_delete_suffix() {
        let service = service();
        let conversation = service.create_conversation(UserId::new(), "", None).await.unwrap();
        let id = conversation.id().unwrap();
        let question = service.add_message(id, NewMessage::user("Name a planet")).await.unwrap();
        let reply = service
            .add_message(id, NewMessage::bot("Mars").with_parent(question))
            .await
            .unwrap();

        let outcome = service
            .regenerate_response(id, reply, "Jupiter", Some(vec![Source::new("Atlas")]))
            .await
            .unwrap();
        assert_eq!(outcome.version, 2);

        let removed = service.delete_message_and_following(id, question).await.unwrap();
        assert_eq!(removed, 2);
        assert!(service.get_conversation(id).await.unwrap().messages().is_empty());
    }
}
