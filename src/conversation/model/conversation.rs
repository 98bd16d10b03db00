//! Conversation aggregate: ordered live messages plus session attributes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::core::clock;
use crate::conversation::core::errors::{ConversationError, ConversationResult};
use crate::conversation::core::ids::{ConversationId, MessageId, UserId};
use crate::conversation::model::message::{Message, NewMessage};
use crate::conversation::model::snapshot::MessageSnapshot;

/// One chat session and its live message list.
///
/// Messages are kept in conversation order. The list only ever loses a
/// contiguous suffix; edits never leave gaps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<ConversationId>,
    pub(crate) user_id: UserId,
    #[serde(default)]
    pub(crate) title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) age: Option<u32>,
    #[serde(default)]
    pub(crate) is_archived: bool,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(default)]
    pub(crate) revision: u64,
    #[serde(default)]
    pub(crate) messages: Vec<Message>,
}

impl Conversation {
    /// Create an empty, unsaved conversation.
    #[must_use]
    pub fn new(user_id: UserId, title: impl Into<String>, age: Option<u32>) -> Self {
        let now = clock::now();
        Self {
            id: None,
            user_id,
            title: title.into(),
            age,
            is_archived: false,
            created_at: now,
            updated_at: now,
            revision: 0,
            messages: Vec::new(),
        }
    }

    /// Store-assigned identifier; `None` until first saved.
    #[must_use]
    pub const fn id(&self) -> Option<ConversationId> {
        self.id
    }

    /// Owning user.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Display title; empty until named.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Age context forwarded to the answer provider.
    #[must_use]
    pub const fn age(&self) -> Option<u32> {
        self.age
    }

    /// Whether the owner archived this conversation.
    #[must_use]
    pub const fn is_archived(&self) -> bool {
        self.is_archived
    }

    /// Creation time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time of the last mutation.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Number of successful saves; 0 for a never-saved aggregate.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Live messages in conversation order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Look up a live message.
    #[must_use]
    pub fn message(&self, message_id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == message_id)
    }

    /// Index of a live message.
    ///
    /// # Errors
    /// Returns `MessageNotFound` if no live message has this id.
    pub fn position(&self, message_id: MessageId) -> ConversationResult<usize> {
        self.messages
            .iter()
            .position(|message| message.id == message_id)
            .ok_or(ConversationError::MessageNotFound(message_id))
    }

    /// Rename the conversation.
    pub fn rename(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.touch();
    }

    /// Set or clear the archived flag.
    pub fn set_archived(&mut self, archived: bool) {
        self.is_archived = archived;
        self.touch();
    }

    /// Append a normal turn. Touches no other message's history.
    pub fn add_message(&mut self, input: NewMessage) -> MessageId {
        let message = Message::new(input);
        let id = message.id;
        self.messages.push(message);
        self.touch();
        id
    }

    /// Snapshot every live message strictly after `from_index`.
    #[must_use]
    pub fn capture_following(&self, from_index: usize) -> Vec<MessageSnapshot> {
        self.messages
            .iter()
            .skip(from_index.saturating_add(1))
            .map(Message::capture)
            .collect()
    }

    /// Keep messages up to and including `target_index`, then append restored
    /// copies of `snapshots`. Returns how many were restored.
    ///
    /// Restored messages get fresh ids. Parent links between messages of the
    /// same batch are rewritten to those ids, including links held in their
    /// version histories. A parent that resolves to no earlier live message
    /// is cleared.
    pub fn restore_following(
        &mut self,
        target_index: usize,
        snapshots: Vec<MessageSnapshot>,
    ) -> usize {
        self.messages.truncate(target_index.saturating_add(1));
        let first_restored = self.messages.len();
        let restored = snapshots.len();

        let mut rebound = HashMap::with_capacity(restored);
        for snapshot in snapshots {
            let captured_id = snapshot.id;
            let message = Message::restore(snapshot);
            if let Some(captured_id) = captured_id {
                rebound.insert(captured_id, message.id);
            }
            self.messages.push(message);
        }

        for index in first_restored..self.messages.len() {
            self.messages[index].rebind_parents(&rebound);
            let parent = self.messages[index].parent_message_id;
            let resolved = parent.is_some_and(|parent| {
                self.messages[..index]
                    .iter()
                    .any(|message| message.id == parent)
            });
            if !resolved {
                self.messages[index].parent_message_id = None;
            }
        }

        restored
    }

    pub(crate) fn assign_identity(&mut self, id: ConversationId, revision: u64) {
        self.id = Some(id);
        self.revision = revision;
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = clock::now();
    }
}
