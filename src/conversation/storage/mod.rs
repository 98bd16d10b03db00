//! Conversation persistence.

pub mod conversation_store;
pub mod memory_store;
pub mod sqlite_store;

pub use conversation_store::{ConversationStore, ConversationSummary, StoreFuture};
pub use memory_store::InMemoryConversationStore;
pub use sqlite_store::SqliteConversationStore;
