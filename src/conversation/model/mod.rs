//! Conversation, message and version data model.

pub mod conversation;
pub mod message;
pub mod snapshot;
pub mod source;
pub mod version;
pub mod versioning;

pub use conversation::Conversation;
pub use message::{Message, NewMessage};
pub use snapshot::MessageSnapshot;
pub use source::{Metadata, Source};
pub use version::Version;
pub use versioning::{EditOutcome, SwitchOutcome};
