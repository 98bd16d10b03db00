//! One content state of a message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::core::clock;
use crate::conversation::model::snapshot::MessageSnapshot;
use crate::conversation::model::source::{Metadata, Source};

/// A write-once content state of a message.
///
/// `following_messages` holds the conversation tail captured while this
/// version was active. It is the only field rewritten after creation, and it
/// holds plain values, never live messages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub(crate) version: u32,
    pub(crate) content: String,
    pub(crate) timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) sources: Option<Vec<Source>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) metadata: Option<Metadata>,
    #[serde(default)]
    pub(crate) following_messages: Vec<MessageSnapshot>,
}

impl Version {
    pub(crate) fn new(
        version: u32,
        content: String,
        sources: Option<Vec<Source>>,
        metadata: Option<Metadata>,
    ) -> Self {
        Self {
            version,
            content,
            timestamp: clock::now(),
            sources,
            metadata,
            following_messages: Vec::new(),
        }
    }

    /// 1-based version number.
    #[must_use]
    pub const fn number(&self) -> u32 {
        self.version
    }

    /// Content of this version.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Creation time.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Citations recorded with this version.
    #[must_use]
    pub fn sources(&self) -> Option<&[Source]> {
        self.sources.as_deref()
    }

    /// Metadata recorded with this version.
    #[must_use]
    pub const fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// Conversation tail captured while this version was active.
    #[must_use]
    pub fn following_messages(&self) -> &[MessageSnapshot] {
        &self.following_messages
    }
}
