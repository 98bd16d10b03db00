//! Composition root: builds the store, services and providers from config.

use std::sync::Arc;

use tracing::info;

use crate::conversation::adapters::OllamaProvider;
use crate::conversation::chat::ChatService;
use crate::conversation::core::config::ChatvaultConfig;
use crate::conversation::core::errors::ConversationResult;
use crate::conversation::provider::{AnswerProvider, TitleGenerator};
use crate::conversation::service::ConversationService;
use crate::conversation::storage::{ConversationStore, SqliteConversationStore};

/// Wired services sharing one store handle.
#[derive(Clone)]
pub struct Chatvault {
    /// Conversation operations.
    pub conversations: ConversationService,
    /// Provider-backed chat flow.
    pub chat: ChatService,
}

/// Validate config, open the `SQLite` store and wire the Ollama provider.
///
/// # Errors
/// Returns an error if config is invalid, the database cannot be opened, or
/// the provider client cannot be built.
pub async fn open(config: &ChatvaultConfig) -> ConversationResult<Chatvault> {
    config.validate()?;

    let store: Arc<dyn ConversationStore> =
        Arc::new(SqliteConversationStore::new(&config.storage).await?);
    let provider = Arc::new(OllamaProvider::new(config.llm.clone())?);
    let answers: Arc<dyn AnswerProvider> = provider.clone();
    let titles: Arc<dyn TitleGenerator> = provider;

    let chatvault = assemble(store, answers, Some(titles), config);
    info!(
        path = %config.storage.sqlite_path.display(),
        model = %config.llm.model,
        "Chatvault ready"
    );
    Ok(chatvault)
}

/// Wire services over caller-provided store and providers.
#[must_use]
pub fn assemble(
    store: Arc<dyn ConversationStore>,
    answers: Arc<dyn AnswerProvider>,
    titles: Option<Arc<dyn TitleGenerator>>,
    config: &ChatvaultConfig,
) -> Chatvault {
    let conversations = ConversationService::new(store);
    let titles = titles.filter(|_| config.chat.generate_titles);
    let chat = ChatService::new(conversations.clone(), answers, titles, config.chat.clone());
    Chatvault {
        conversations,
        chat,
    }
}
