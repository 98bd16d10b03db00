//! Edit, regenerate, switch and delete operations on the conversation aggregate.
//!
//! Every superseding operation follows the same sequence:
//! 1. capture the live tail after the target message,
//! 2. store it in the target's currently selected version (overwrite),
//! 3. append and select a new version,
//! 4. drop the live tail.
//!
//! Switching runs the inverse: select a version, then replace the live tail
//! with whatever that version captured.

use tracing::{debug, warn};

use crate::conversation::core::errors::{ConversationError, ConversationResult};
use crate::conversation::core::ids::MessageId;
use crate::conversation::core::role::Role;
use crate::conversation::model::conversation::Conversation;
use crate::conversation::model::message::{Message, NewMessage};
use crate::conversation::model::source::Source;

/// Result of an edit or regeneration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EditOutcome {
    /// Message that received the new version.
    pub message_id: MessageId,
    /// Number of the newly selected version.
    pub version: u32,
    /// Live messages moved into the previous version's history.
    pub captured: usize,
}

/// Result of a version switch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwitchOutcome {
    /// Message whose version changed.
    pub message_id: MessageId,
    /// Newly selected version.
    pub version: u32,
    /// Messages restored after the switched message.
    pub restored: usize,
}

impl Conversation {
    /// Replace a user message's content with a new version.
    ///
    /// The messages after it are kept only inside the superseded version.
    ///
    /// # Errors
    /// `MessageNotFound` if absent, `InvalidRole` if the message is not a user message.
    pub fn edit_message(
        &mut self,
        message_id: MessageId,
        new_content: impl Into<String>,
    ) -> ConversationResult<EditOutcome> {
        let index = self.index_with_role(message_id, Role::User)?;
        Ok(self.supersede(index, new_content.into(), None))
    }

    /// Insert a bot reply right after a user message and refresh the user
    /// message's selected version so it captures the new reply.
    ///
    /// # Errors
    /// `MessageNotFound` if absent, `InvalidRole` if the message is not a user message.
    pub fn regenerate_bot_response_after_edit(
        &mut self,
        user_message_id: MessageId,
        new_response: impl Into<String>,
        sources: Option<Vec<Source>>,
    ) -> ConversationResult<MessageId> {
        let index = self.index_with_role(user_message_id, Role::User)?;

        let mut reply = NewMessage::bot(new_response).with_parent(user_message_id);
        reply.sources = sources;
        let reply = Message::new(reply);
        let reply_id = reply.id;
        self.messages.insert(index + 1, reply);

        let captured = self.capture_following(index);
        self.messages[index].record_following(captured);
        self.touch();

        debug!(
            message_id = %user_message_id,
            reply_id = %reply_id,
            "Attached regenerated reply"
        );
        Ok(reply_id)
    }

    /// Replace a bot message's content with a new version.
    ///
    /// # Errors
    /// `MessageNotFound` if absent, `InvalidRole` if the message is not a bot message.
    pub fn regenerate_response(
        &mut self,
        message_id: MessageId,
        new_response: impl Into<String>,
        sources: Option<Vec<Source>>,
    ) -> ConversationResult<EditOutcome> {
        let index = self.index_with_role(message_id, Role::Bot)?;
        Ok(self.supersede(index, new_response.into(), sources))
    }

    /// Select another version of a message and restore the tail it captured.
    ///
    /// Only the selected version's history is read. The version switched away
    /// from keeps whatever it held before.
    ///
    /// Selecting the version that is already active still replaces the tail
    /// with its captured history. Messages appended with `add_message` since
    /// that version was last superseded are not part of it and are dropped.
    ///
    /// # Errors
    /// `MessageNotFound` if absent, `InvalidVersion` if `version_number` is out
    /// of range. The conversation is unchanged on error.
    pub fn switch_version(
        &mut self,
        message_id: MessageId,
        version_number: u32,
    ) -> ConversationResult<SwitchOutcome> {
        let index = self.position(message_id).inspect_err(|_| {
            warn!(message_id = %message_id, "Cannot switch version of unknown message");
        })?;

        let message = &mut self.messages[index];
        let Some(following) = message.select_version(version_number) else {
            let available = message.versions.len();
            warn!(
                message_id = %message_id,
                requested = version_number,
                available,
                "Requested version out of range"
            );
            return Err(ConversationError::InvalidVersion {
                message_id,
                requested: version_number,
                available,
            });
        };

        let restored = self.restore_following(index, following);
        self.touch();

        debug!(
            message_id = %message_id,
            version = version_number,
            restored,
            "Switched message version"
        );
        Ok(SwitchOutcome {
            message_id,
            version: version_number,
            restored,
        })
    }

    /// Drop a message and everything after it. Nothing is kept in history.
    ///
    /// Returns the number of messages removed.
    ///
    /// # Errors
    /// `MessageNotFound` if absent.
    pub fn delete_message_and_following(
        &mut self,
        message_id: MessageId,
    ) -> ConversationResult<usize> {
        let index = self.position(message_id)?;
        let removed = self.messages.len() - index;
        self.messages.truncate(index);
        self.touch();
        Ok(removed)
    }

    fn index_with_role(&self, message_id: MessageId, expected: Role) -> ConversationResult<usize> {
        let index = self.position(message_id)?;
        let actual = self.messages[index].role;
        if actual != expected {
            return Err(ConversationError::InvalidRole {
                message_id,
                expected,
                actual,
            });
        }
        Ok(index)
    }

    fn supersede(
        &mut self,
        index: usize,
        content: String,
        sources: Option<Vec<Source>>,
    ) -> EditOutcome {
        let tail = self.capture_following(index);
        let captured = tail.len();

        let message = &mut self.messages[index];
        message.record_following(tail);
        let version = message.push_version(content, sources, None);
        let message_id = message.id;

        self.messages.truncate(index + 1);
        self.touch();

        debug!(
            message_id = %message_id,
            version,
            captured,
            "Created message version"
        );
        EditOutcome {
            message_id,
            version,
            captured,
        }
    }
}
