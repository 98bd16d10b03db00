//! Core conversation types and identifiers.

pub mod clock;
pub mod config;
pub mod errors;
pub mod ids;
pub mod role;

pub use config::{ChatConfig, ChatvaultConfig, LlmConfig, StorageConfig};
pub use errors::{ConversationError, ConversationResult};
pub use ids::{ConversationId, MessageId, UserId};
pub use role::Role;
