//! Conversation versioning for the chat backend.
//!
//! Organized into:
//! - `core`: Configuration, errors, ids, roles, and the clock
//! - `model`: Conversation aggregate, messages, versions, and snapshots
//! - `storage`: Store trait with `SQLite` and in-memory backends
//! - `service`: Load, mutate, save operations over a store
//! - `provider`: Answer and title provider traits
//! - `chat`: Question/answer flow recorded as versions
//! - `view`: Outward serialized shape
//! - `adapters`: Integration adapters (e.g., Rig)

pub mod adapters;
pub mod chat;
pub mod core;
pub mod model;
pub mod provider;
pub mod service;
pub mod storage;
pub mod view;

pub use adapters::{OllamaProvider, init_tracing};
pub use chat::{ChatService, ChatTurn, EditTurn, clean_title};
pub use core::{
    ChatConfig, ChatvaultConfig, ConversationError, ConversationId, ConversationResult, LlmConfig,
    MessageId, Role, StorageConfig, UserId,
};
pub use model::{
    Conversation, EditOutcome, Message, MessageSnapshot, Metadata, NewMessage, Source,
    SwitchOutcome, Version,
};
pub use provider::{
    Answer, AnswerProvider, AnswerRequest, ContextTurn, ProviderFuture, TitleGenerator,
};
pub use service::ConversationService;
pub use storage::{
    ConversationStore, ConversationSummary, InMemoryConversationStore, SqliteConversationStore,
    StoreFuture,
};
pub use view::{ConversationView, MessageView, VersionView};
