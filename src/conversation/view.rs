//! Outward serialized shape of a conversation.
//!
//! Version histories are exposed without their captured branches.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::conversation::core::ids::{ConversationId, MessageId, UserId};
use crate::conversation::core::role::Role;
use crate::conversation::model::conversation::Conversation;
use crate::conversation::model::message::Message;
use crate::conversation::model::source::{Metadata, Source};
use crate::conversation::model::version::Version;

/// Serialized conversation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConversationView {
    /// Conversation id; absent before the first save.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ConversationId>,
    /// Owning user.
    pub user_id: UserId,
    /// Display title.
    pub title: String,
    /// Age context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    /// Archived flag.
    pub is_archived: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
    /// Live messages in order.
    pub messages: Vec<MessageView>,
}

/// Serialized live message.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MessageView {
    /// Message id.
    pub id: MessageId,
    /// Author role.
    pub role: Role,
    /// Content of the selected version.
    pub content: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Selected version number.
    pub current_version: u32,
    /// Whether more than one version was ever created.
    pub is_edited: bool,
    /// Sources of the selected version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    /// Metadata of the selected version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// User message this reply answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<MessageId>,
    /// Version list, oldest first.
    pub versions: Vec<VersionView>,
}

/// Serialized version entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VersionView {
    /// Version number.
    pub version: u32,
    /// Content.
    pub content: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    /// Metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl From<&Version> for VersionView {
    fn from(version: &Version) -> Self {
        Self {
            version: version.number(),
            content: version.content().to_string(),
            timestamp: version.timestamp(),
            sources: version.sources().map(<[Source]>::to_vec),
            metadata: version.metadata().cloned(),
        }
    }
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id(),
            role: message.role(),
            content: message.content().to_string(),
            timestamp: message.timestamp(),
            current_version: message.current_version(),
            is_edited: message.is_edited(),
            sources: message.sources().map(<[Source]>::to_vec),
            metadata: message.metadata().cloned(),
            parent_message_id: message.parent_message_id(),
            versions: message.versions().iter().map(VersionView::from).collect(),
        }
    }
}

impl From<&Conversation> for ConversationView {
    fn from(conversation: &Conversation) -> Self {
        Self {
            id: conversation.id(),
            user_id: conversation.user_id(),
            title: conversation.title().to_string(),
            age: conversation.age(),
            is_archived: conversation.is_archived(),
            created_at: conversation.created_at(),
            updated_at: conversation.updated_at(),
            messages: conversation.messages().iter().map(MessageView::from).collect(),
        }
    }
}
