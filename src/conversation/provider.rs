//! Traits for the answer and title backends used by the chat flow.

use std::future::Future;
use std::pin::Pin;

use crate::conversation::core::errors::ConversationResult;
use crate::conversation::core::role::Role;
use crate::conversation::model::message::Message;
use crate::conversation::model::source::Source;

/// Boxed future type for provider calls.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One prior turn passed as context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextTurn {
    /// Author role.
    pub role: Role,
    /// Turn content.
    pub content: String,
}

impl From<&Message> for ContextTurn {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role(),
            content: message.content().to_string(),
        }
    }
}

/// Question sent to the answer provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerRequest {
    /// User question.
    pub query: String,
    /// Age of the reader, used to adapt the wording.
    pub age: Option<u32>,
    /// Prior turns, oldest first.
    pub context: Vec<ContextTurn>,
}

/// Answer text with the documents it cites.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Answer {
    /// Answer text.
    pub text: String,
    /// Cited sources; empty when the answer cites nothing.
    pub sources: Vec<Source>,
}

impl Answer {
    /// Sources in the shape stored on messages.
    #[must_use]
    pub fn stored_sources(&self) -> Option<Vec<Source>> {
        (!self.sources.is_empty()).then(|| self.sources.clone())
    }
}

/// Produces answers to user questions.
pub trait AnswerProvider: Send + Sync {
    /// Answer a question.
    ///
    /// # Errors
    /// Returns an error if the backend call fails.
    fn answer(&self, request: AnswerRequest) -> ProviderFuture<'_, ConversationResult<Answer>>;
}

/// Produces short conversation titles.
pub trait TitleGenerator: Send + Sync {
    /// Suggest a title from the first exchange. The raw output is cleaned by the caller.
    ///
    /// # Errors
    /// Returns an error if the backend call fails.
    fn generate_title<'a>(
        &'a self,
        first_user_message: &'a str,
        first_reply: &'a str,
    ) -> ProviderFuture<'a, ConversationResult<String>>;
}
