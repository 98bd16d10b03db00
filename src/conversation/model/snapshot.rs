//! Serialized message records stored inside version history.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::core::ids::MessageId;
use crate::conversation::core::role::Role;
use crate::conversation::model::source::{Metadata, Source};
use crate::conversation::model::version::Version;

const fn first_version() -> u32 {
    1
}

/// Captured copy of a message.
///
/// Snapshots are values: restoring one always produces a new live message
/// with a fresh id. `id` records the message the snapshot was taken from so
/// parent links inside a restored batch can follow their targets. Versions inside a snapshot keep their own captured tails
/// untouched until one of them is restored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageSnapshot {
    /// Id of the captured message; absent in legacy records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    /// Author role.
    pub role: Role,
    /// Content of the selected version.
    pub content: String,
    /// Creation time of the original message.
    pub timestamp: DateTime<Utc>,
    /// Selected version number.
    #[serde(default = "first_version")]
    pub current_version: u32,
    /// Whether the message had more than its original content.
    #[serde(default)]
    pub is_edited: bool,
    /// Citations of the selected version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    /// Metadata of the selected version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// User message this bot reply answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<MessageId>,
    /// Full version history. Empty only in legacy records.
    #[serde(default)]
    pub versions: Vec<Version>,
}

impl MessageSnapshot {
    /// Point parent links at the new ids in `rebound`, down through every
    /// nested version history.
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
}
