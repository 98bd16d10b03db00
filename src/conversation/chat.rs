//! Chat flow: ask the answer provider and record its output as versions.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::conversation::core::config::ChatConfig;
use crate::conversation::core::errors::{ConversationError, ConversationResult};
use crate::conversation::core::ids::{ConversationId, MessageId};
use crate::conversation::core::role::Role;
use crate::conversation::model::conversation::Conversation;
use crate::conversation::model::message::NewMessage;
use crate::conversation::model::versioning::EditOutcome;
use crate::conversation::provider::{
    Answer, AnswerProvider, AnswerRequest, ContextTurn, TitleGenerator,
};
use crate::conversation::service::ConversationService;

/// Result of a normal question and answer turn.
#[derive(Debug)]
pub struct ChatTurn {
    /// Stored user message.
    pub user_message_id: MessageId,
    /// Stored bot reply.
    pub reply_id: MessageId,
    /// Provider answer.
    pub answer: Answer,
    /// Detached title task, when one was started.
    pub title_task: Option<JoinHandle<()>>,
}

/// Result of editing a user message and answering it again.
#[derive(Clone, Debug, PartialEq)]
pub struct EditTurn {
    /// New version on the user message.
    pub edit: EditOutcome,
    /// Reply attached to the new version.
    pub reply_id: MessageId,
    /// Provider answer.
    pub answer: Answer,
}

/// Drives the answer provider around the conversation service.
#[derive(Clone)]
pub struct ChatService {
    conversations: ConversationService,
    answers: Arc<dyn AnswerProvider>,
    titles: Option<Arc<dyn TitleGenerator>>,
    config: ChatConfig,
}

impl ChatService {
    /// Build a chat service.
    #[must_use]
    pub fn new(
        conversations: ConversationService,
        answers: Arc<dyn AnswerProvider>,
        titles: Option<Arc<dyn TitleGenerator>>,
        config: ChatConfig,
    ) -> Self {
        Self {
            conversations,
            answers,
            titles,
            config,
        }
    }

    /// Conversation service used for persistence.
    #[must_use]
    pub const fn conversations(&self) -> &ConversationService {
        &self.conversations
    }

    /// Store a user message, answer it and store the reply.
    ///
    /// The user message stays stored if the provider fails.
    ///
    /// # Errors
    /// Not-found, provider, `ConcurrentModification`, or persistence errors.
    pub async fn send_message(
        &self,
        conversation_id: ConversationId,
        content: &str,
    ) -> ConversationResult<ChatTurn> {
        let conversation = self.conversations.get_conversation(conversation_id).await?;
        let first_exchange = !conversation
            .messages()
            .iter()
            .any(|message| message.role() == Role::User);
        let wants_title = first_exchange && conversation.title().trim().is_empty();
        let request = self.request(&conversation, content, conversation.messages().len());

        let user_message_id = self
            .conversations
            .add_message(conversation_id, NewMessage::user(content))
            .await?;

        let answer = self.ask(conversation_id, request).await?;

        let mut reply = NewMessage::bot(answer.text.clone()).with_parent(user_message_id);
        reply.sources = answer.stored_sources();
        let reply_id = self.conversations.add_message(conversation_id, reply).await?;

        let title_task = if wants_title {
            self.spawn_title(conversation_id, content.to_string(), answer.text.clone())
        } else {
            None
        };

        info!(
            conversation_id = %conversation_id,
            user_message_id = %user_message_id,
            reply_id = %reply_id,
            sources = answer.sources.len(),
            "Chat turn stored"
        );
        Ok(ChatTurn {
            user_message_id,
            reply_id,
            answer,
            title_task,
        })
    }

    /// Edit a user message, answer the new content and attach the reply to
    /// the new version.
    ///
    /// # Errors
    /// Not-found, `InvalidRole`, provider, `ConcurrentModification`, or persistence errors.
    pub async fn edit_and_regenerate(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
        new_content: &str,
    ) -> ConversationResult<EditTurn> {
        let edit = self
            .conversations
            .edit_message(conversation_id, message_id, new_content)
            .await?;

        let conversation = self.conversations.get_conversation(conversation_id).await?;
        let index = conversation.position(message_id)?;
        let request = self.request(&conversation, new_content, index);
        let answer = self.ask(conversation_id, request).await?;

        let reply_id = self
            .conversations
            .regenerate_bot_response_after_edit(
                conversation_id,
                message_id,
                answer.text.clone(),
                answer.stored_sources(),
            )
            .await?;

        info!(
            conversation_id = %conversation_id,
            message_id = %message_id,
            version = edit.version,
            reply_id = %reply_id,
            "Edited message answered"
        );
        Ok(EditTurn {
            edit,
            reply_id,
            answer,
        })
    }

    /// Answer the prompt behind a bot message again and store it as a new version.
    ///
    /// The prompt is the reply's parent message when it is still live,
    /// otherwise the closest user message before the reply.
    ///
    /// # Errors
    /// Not-found, `InvalidRole`, `MissingPrompt`, provider,
    /// `ConcurrentModification`, or persistence errors.
    pub async fn regenerate_reply(
        &self,
        conversation_id: ConversationId,
        reply_id: MessageId,
    ) -> ConversationResult<EditOutcome> {
        let conversation = self.conversations.get_conversation(conversation_id).await?;
        let reply_index = conversation.position(reply_id)?;
        let reply = &conversation.messages()[reply_index];
        if reply.role() != Role::Bot {
            return Err(ConversationError::InvalidRole {
                message_id: reply_id,
                expected: Role::Bot,
                actual: reply.role(),
            });
        }

        let prompt_index = prompt_index(&conversation, reply_index)
            .ok_or(ConversationError::MissingPrompt(reply_id))?;
        let prompt = conversation.messages()[prompt_index].content().to_string();
        let request = self.request(&conversation, &prompt, prompt_index);
        let answer = self.ask(conversation_id, request).await?;

        let outcome = self
            .conversations
            .regenerate_response(
                conversation_id,
                reply_id,
                answer.text.clone(),
                answer.stored_sources(),
            )
            .await?;

        info!(
            conversation_id = %conversation_id,
            message_id = %reply_id,
            version = outcome.version,
            "Reply regenerated"
        );
        Ok(outcome)
    }

    fn request(&self, conversation: &Conversation, query: &str, before: usize) -> AnswerRequest {
        let prior = &conversation.messages()[..before.min(conversation.messages().len())];
        let skip = prior.len().saturating_sub(self.config.context_turns);
        AnswerRequest {
            query: query.to_string(),
            age: conversation.age().or(self.config.default_age),
            context: prior[skip..].iter().map(ContextTurn::from).collect(),
        }
    }

    async fn ask(
        &self,
        conversation_id: ConversationId,
        request: AnswerRequest,
    ) -> ConversationResult<Answer> {
        debug!(
            conversation_id = %conversation_id,
            context_turns = request.context.len(),
            "Requesting answer"
        );
        self.answers.answer(request).await.inspect_err(|err| {
            warn!(conversation_id = %conversation_id, error = %err, "Answer provider failed");
        })
    }

    fn spawn_title(
        &self,
        conversation_id: ConversationId,
        first_user_message: String,
        first_reply: String,
    ) -> Option<JoinHandle<()>> {
        if !self.config.generate_titles {
            return None;
        }
        let titles = Arc::clone(self.titles.as_ref()?);
        let conversations = self.conversations.clone();
        let max_chars = self.config.title_max_chars;

        Some(tokio::spawn(async move {
            let raw = match titles.generate_title(&first_user_message, &first_reply).await {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(conversation_id = %conversation_id, error = %err, "Title generation failed");
                    return;
                }
            };

            let title = clean_title(&raw, max_chars);
            if title.is_empty() {
                warn!(conversation_id = %conversation_id, "Title generator returned nothing usable");
                return;
            }

            match conversations.rename_if_untitled(conversation_id, &title).await {
                Ok(true) => info!(conversation_id = %conversation_id, title = %title, "Conversation titled"),
                Ok(false) => debug!(conversation_id = %conversation_id, "Conversation already titled"),
                Err(err) => {
                    warn!(conversation_id = %conversation_id, error = %err, "Failed to save title");
                }
            }
        }))
    }
}

fn prompt_index(conversation: &Conversation, reply_index: usize) -> Option<usize> {
    let messages = conversation.messages();
    let parent = messages[reply_index]
        .parent_message_id()
        .and_then(|parent| conversation.position(parent).ok())
        .filter(|&index| index < reply_index && messages[index].role() == Role::User);

    parent.or_else(|| {
        messages[..reply_index]
            .iter()
            .rposition(|message| message.role() == Role::User)
    })
}

/// Strip wrapping quotes and emphasis from a generated title and cap its length.
#[must_use]
pub fn clean_title(raw: &str, max_chars: usize) -> String {
    let title = raw
        .trim()
        .trim_matches('"')
        .trim_matches('*')
        .trim();
    title.chars().take(max_chars).collect::<String>().trim_end().to_string()
}
