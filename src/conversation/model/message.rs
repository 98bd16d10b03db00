//! Live message model with version history.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::conversation::core::ids::MessageId;
use crate::conversation::core::role::Role;
use crate::conversation::model::snapshot::MessageSnapshot;
use crate::conversation::model::source::{Metadata, Source};
use crate::conversation::model::version::Version;

/// Input for appending a message to a conversation.
#[derive(Clone, Debug, PartialEq)]
pub struct NewMessage {
    /// Author role.
    pub role: Role,
    /// Message content.
    pub content: String,
    /// Optional citations.
    pub sources: Option<Vec<Source>>,
    /// Optional metadata.
    pub metadata: Option<Metadata>,
    /// User message a bot reply answers.
    pub parent_message_id: Option<MessageId>,
}

impl NewMessage {
    /// A user turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// A bot turn.
    #[must_use]
    pub fn bot(content: impl Into<String>) -> Self {
        Self::new(Role::Bot, content)
    }

    /// A turn with an explicit role.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            sources: None,
            metadata: None,
            parent_message_id: None,
        }
    }

    /// Attach citations. An empty list is stored as no sources.
    #[must_use]
    pub fn with_sources(mut self, sources: Vec<Source>) -> Self {
        self.sources = (!sources.is_empty()).then_some(sources);
        self
    }

    /// Attach metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Link to the user message being answered.
    #[must_use]
    pub const fn with_parent(mut self, parent: MessageId) -> Self {
        self.parent_message_id = Some(parent);
        self
    }
}

/// One live turn of a conversation.
///
/// `content`, `sources` and `metadata` always mirror the selected version.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "MessageSnapshot")]
pub struct Message {
    pub(crate) id: MessageId,
    pub(crate) role: Role,
    pub(crate) content: String,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) current_version: u32,
    pub(crate) is_edited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) sources: Option<Vec<Source>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) parent_message_id: Option<MessageId>,
    pub(crate) versions: Vec<Version>,
}

/// Stored live messages share the snapshot layout and keep their id.
impl From<MessageSnapshot> for Message {
    fn from(snapshot: MessageSnapshot) -> Self {
        Self::from_snapshot(snapshot.id.unwrap_or_default(), snapshot)
    }
}

impl Message {
    /// Build a fresh message with a single version.
    #[must_use]
    pub fn new(input: NewMessage) -> Self {
        let first = Version::new(
            1,
            input.content.clone(),
            input.sources.clone(),
            input.metadata.clone(),
        );
        Self {
            id: MessageId::new(),
            role: input.role,
            content: input.content,
            timestamp: first.timestamp,
            current_version: 1,
            is_edited: false,
            sources: input.sources,
            metadata: input.metadata,
            parent_message_id: input.parent_message_id,
            versions: vec![first],
        }
    }

    /// Capture this message as a storable value.
    #[must_use]
    pub fn capture(&self) -> MessageSnapshot {
        MessageSnapshot {
            id: Some(self.id),
            role: self.role,
            content: self.content.clone(),
            timestamp: self.timestamp,
            current_version: self.current_version,
            is_edited: self.is_edited,
            sources: self.sources.clone(),
            metadata: self.metadata.clone(),
            parent_message_id: self.parent_message_id,
            versions: self.versions.clone(),
        }
    }

    /// Rebuild a live message from a snapshot under a new id.
    #[must_use]
    pub fn restore(snapshot: MessageSnapshot) -> Self {
        Self::from_snapshot(MessageId::new(), snapshot)
    }

    fn from_snapshot(id: MessageId, snapshot: MessageSnapshot) -> Self {
        let MessageSnapshot {
            id: _,
            role,
            content,
            timestamp,
            current_version,
            is_edited,
            sources,
            metadata,
            parent_message_id,
            mut versions,
        } = snapshot;

        if versions.is_empty() {
            versions.push(Version {
                version: 1,
                content: content.clone(),
                timestamp,
                sources: sources.clone(),
                metadata: metadata.clone(),
                following_messages: Vec::new(),
            });
        }

        let mut message = Self {
            id,
            role,
            content,
            timestamp,
            current_version,
            is_edited,
            sources,
            metadata,
            parent_message_id,
            versions,
        };

        if message.version(current_version).is_none() {
            let last = message.latest_version_number();
            warn!(
                message_id = %id,
                current_version,
                clamped_to = last,
                "Stored current_version out of range"
            );
            message.mirror_version(last);
        }

        message
    }

    /// Unique identifier, stable across edits.
    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    /// Author role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Content of the selected version.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Creation time.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Selected version number (1-based).
    #[must_use]
    pub const fn current_version(&self) -> u32 {
        self.current_version
    }

    /// Whether a new version was ever created for this message.
    #[must_use]
    pub const fn is_edited(&self) -> bool {
        self.is_edited
    }

    /// Citations of the selected version.
    #[must_use]
    pub fn sources(&self) -> Option<&[Source]> {
        self.sources.as_deref()
    }

    /// Metadata of the selected version.
    #[must_use]
    pub const fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// User message this bot reply answered.
    #[must_use]
    pub const fn parent_message_id(&self) -> Option<MessageId> {
        self.parent_message_id
    }

    /// Full version history, oldest first.
    #[must_use]
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    /// Look up a version by number.
    #[must_use]
    pub fn version(&self, number: u32) -> Option<&Version> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.versions.get(index)
    }

    fn version_mut(&mut self, number: u32) -> Option<&mut Version> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.versions.get_mut(index)
    }

    fn latest_version_number(&self) -> u32 {
        u32::try_from(self.versions.len()).unwrap_or(u32::MAX)
    }

    /// Point this message's parent link, and those in its history, at the
    /// new ids in `rebound`.
    pub(crate) fn rebind_parents(&mut self, rebound: &HashMap<MessageId, MessageId>) {
        if let Some(parent) = self
            .parent_message_id
            .and_then(|parent| rebound.get(&parent).copied())
        {
            self.parent_message_id = Some(parent);
        }
        for version in &mut self.versions {
            for snapshot in &mut version.following_messages {
                snapshot.rebind_parents(rebound);
            }
        }
    }

    /// Overwrite the selected version's captured tail.
    pub(crate) fn record_following(&mut self, snapshots: Vec<MessageSnapshot>) {
        if let Some(active) = self.version_mut(self.current_version) {
            active.following_messages = snapshots;
        }
    }

    /// Append and select a new version. Returns its number.
    pub(crate) fn push_version(
        &mut self,
        content: String,
        sources: Option<Vec<Source>>,
        metadata: Option<Metadata>,
    ) -> u32 {
        let number = self.latest_version_number().saturating_add(1);
        self.versions
            .push(Version::new(number, content, sources, metadata));
        self.mirror_version(number);
        self.is_edited = true;
        number
    }

    /// Select a version and return a copy of its captured tail.
    ///
    /// Returns `None` and leaves the message untouched if `number` is out of range.
    pub(crate) fn select_version(&mut self, number: u32) -> Option<Vec<MessageSnapshot>> {
        let following = self.version(number)?.following_messages.clone();
        self.mirror_version(number);
        Some(following)
    }

    fn mirror_version(&mut self, number: u32) {
        let Some(selected) = self.version(number) else {
            return;
        };
        let content = selected.content.clone();
        let sources = selected.sources.clone();
        let metadata = selected.metadata.clone();
        self.current_version = number;
        self.content = content;
        self.sources = sources;
        self.metadata = metadata;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cited(content: &str) -> Message {
        let mut metadata = Metadata::new();
        metadata.insert("model".to_string(), serde_json::json!("test"));
        Message::new(
            NewMessage::bot(content)
                .with_sources(vec![Source::new("Guide")])
                .with_metadata(metadata),
        )
    }

    #[test]
    fn test_new_message_has_single_version() {
        let message = Message::new(NewMessage::user("hello"));
        assert_eq!(message.current_version(), 1);
        assert_eq!(message.versions().len(), 1);
        assert_eq!(message.versions()[0].content(), "hello");
        assert!(message.versions()[0].following_messages().is_empty());
        assert!(!message.is_edited());
    }

    #[test]
    fn test_empty_sources_are_dropped() {
        let input = NewMessage::bot("answer").with_sources(Vec::new());
        assert!(input.sources.is_none());
    }

    #[test]
    fn test_capture_restore_keeps_content_but_not_id() {
        let original = cited("answer");
        let restored = Message::restore(original.capture());

        assert_ne!(restored.id(), original.id());
        assert_eq!(restored.role(), original.role());
        assert_eq!(restored.content(), original.content());
        assert_eq!(restored.sources(), original.sources());
        assert_eq!(restored.metadata(), original.metadata());
        assert_eq!(restored.versions(), original.versions());
        assert_eq!(restored.timestamp(), original.timestamp());
    }

    #[test]
    fn test_restore_synthesizes_missing_versions() {
        let snapshot: MessageSnapshot = serde_json::from_value(serde_json::json!({
            "role": "bot",
            "content": "legacy answer",
            "timestamp": "2024-05-01T10:00:00Z",
            "sources": [{ "title": "Old doc" }]
        }))
        .unwrap();

        let message = Message::restore(snapshot);
        assert_eq!(message.versions().len(), 1);
        let first = &message.versions()[0];
        assert_eq!(first.number(), 1);
        assert_eq!(first.content(), "legacy answer");
        assert_eq!(first.sources().map(<[Source]>::len), Some(1));
        assert!(first.following_messages().is_empty());
    }

    #[test]
    fn test_restore_clamps_out_of_range_version() {
        let mut snapshot = Message::new(NewMessage::user("a")).capture();
        snapshot.current_version = 7;
        snapshot.content = "stale".to_string();

        let message = Message::restore(snapshot);
        assert_eq!(message.current_version(), 1);
        assert_eq!(message.content(), "a");
    }

    #[test]
    fn test_push_version_mirrors_and_resets_sources() {
        let mut message = cited("first");
        let number = message.push_version("second".to_string(), None, None);

        assert_eq!(number, 2);
        assert_eq!(message.current_version(), 2);
        assert_eq!(message.content(), "second");
        assert!(message.sources().is_none());
        assert!(message.metadata().is_none());
        assert!(message.is_edited());
    }

    #[test]
    fn test_select_version_out_of_range_is_noop() {
        let mut message = cited("first");
        let before = message.clone();
        assert!(message.select_version(0).is_none());
        assert!(message.select_version(2).is_none());
        assert_eq!(message, before);
    }

    #[test]
    fn test_stored_message_keeps_id() {
        let message = cited("answer");
        let json = serde_json::to_string(&message).unwrap();
        let loaded: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, message);
    }

    #[test]
    fn test_stored_message_rejects_unknown_role() {
        let json = serde_json::json!({
            "id": MessageId::new(),
            "role": "system",
            "content": "x",
            "timestamp": "2024-05-01T10:00:00Z"
        });
        assert!(serde_json::from_value::<Message>(json).is_err());
    }
}
