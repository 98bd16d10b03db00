//! Rig adapter: Ollama-backed answer and title providers.

use reqwest::Client as ReqwestClient;
use rig::client::CompletionClient;
use rig::completion::CompletionModel;
use rig::message::AssistantContent;
use rig::providers::ollama;
use tracing::debug;

use crate::conversation::core::config::LlmConfig;
use crate::conversation::core::errors::{ConversationError, ConversationResult};
use crate::conversation::core::role::Role;
use crate::conversation::provider::{
    Answer, AnswerProvider, AnswerRequest, ProviderFuture, TitleGenerator,
};

/// Characters of each message shown to the title prompt.
const TITLE_EXCERPT_CHARS: usize = 200;

/// Initialize tracing with a basic subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();
}

/// Ollama completion model wrapped as an answer and title provider.
///
/// Answers carry no sources; retrieval-backed providers fill them in.
pub struct OllamaProvider {
    client: ollama::Client<ReqwestClient>,
    config: LlmConfig,
}

impl OllamaProvider {
    /// Build the Ollama client from config.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: LlmConfig) -> ConversationResult<Self> {
        let builder = ollama::Client::<ReqwestClient>::builder().api_key(rig::client::Nothing);
        let builder = if let Some(base_url) = &config.base_url {
            builder.base_url(base_url)
        } else {
            builder
        };
        let client = builder.build().map_err(ConversationError::from)?;
        Ok(Self { client, config })
    }

    async fn complete(&self, prompt: String) -> ConversationResult<String> {
        let model = self.client.completion_model(self.config.model.clone());
        let request = model
            .completion_request(prompt)
            .temperature(self.config.temperature)
            .max_tokens_opt(self.config.max_tokens)
            .build();

        let response = model.completion(request).await?;
        let text = extract_text(&response.choice);
        if text.trim().is_empty() {
            return Err(ConversationError::Provider(format!(
                "model {} returned no text",
                self.config.model
            )));
        }
        debug!(model = %self.config.model, chars = text.len(), "Completion received");
        Ok(text)
    }
}

impl AnswerProvider for OllamaProvider {
    fn answer(&self, request: AnswerRequest) -> ProviderFuture<'_, ConversationResult<Answer>> {
        Box::pin(async move {
            let text = self.complete(build_answer_prompt(&request)).await?;
            Ok(Answer {
                text: text.trim().to_string(),
                sources: Vec::new(),
            })
        })
    }
}

impl TitleGenerator for OllamaProvider {
    fn generate_title<'a>(
        &'a self,
        first_user_message: &'a str,
        first_reply: &'a str,
    ) -> ProviderFuture<'a, ConversationResult<String>> {
        Box::pin(async move {
            self.complete(build_title_prompt(first_user_message, first_reply))
                .await
        })
    }
}

/// Render the answer prompt: age guidance, prior turns, then the question.
#[must_use]
pub fn build_answer_prompt(request: &AnswerRequest) -> String {
    let mut prompt = String::from("You are a friendly assistant answering questions clearly and accurately.\n");
    if let Some(age) = request.age {
        prompt.push_str(&format!(
            "The reader is {age} years old. Use words and examples suited to that age.\n"
        ));
    }

    if !request.context.is_empty() {
        prompt.push_str("\nConversation so far:\n");
        for turn in &request.context {
            let speaker = match turn.role {
                Role::User => "User",
                Role::Bot => "Assistant",
            };
            prompt.push_str(&format!("{speaker}: {}\n", turn.content));
        }
    }

    prompt.push_str(&format!("\nUser: {}\nAssistant:", request.query));
    prompt
}

/// Render the title prompt from the first exchange.
#[must_use]
pub fn build_title_prompt(first_user_message: &str, first_reply: &str) -> String {
    format!(
        "Generate a very short title (3-6 words maximum) for this conversation.
Output ONLY the title, nothing else. No quotes, no punctuation at the end.
Do not use asterisks or any special formatting.

User: {}
Assistant: {}

Title:",
        excerpt(first_user_message),
        excerpt(first_reply)
    )
}

fn excerpt(text: &str) -> String {
    text.chars().take(TITLE_EXCERPT_CHARS).collect()
}

fn extract_text(choice: &rig::OneOrMany<AssistantContent>) -> String {
    let mut out = String::new();
    for content in choice.iter() {
        if let AssistantContent::Text(text) = content {
            out.push_str(&text.text);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::provider::ContextTurn;

    #[test]
    fn test_answer_prompt_includes_age_and_context() {
        let request = AnswerRequest {
            query: "Why do cats purr?".to_string(),
            age: Some(8),
            context: vec![
                ContextTurn {
                    role: Role::User,
                    content: "Tell me about cats".to_string(),
                },
                ContextTurn {
                    role: Role::Bot,
                    content: "Cats are small felines.".to_string(),
                },
            ],
        };
        let prompt = build_answer_prompt(&request);
        assert!(prompt.contains("8 years old"));
        assert!(prompt.contains("User: Tell me about cats\nAssistant: Cats are small felines.\n"));
        assert!(prompt.ends_with("User: Why do cats purr?\nAssistant:"));
    }

    #[test]
    fn test_answer_prompt_without_age() {
        let request = AnswerRequest {
            query: "Hi".to_string(),
            age: None,
            context: Vec::new(),
        };
        let prompt = build_answer_prompt(&request);
        assert!(!prompt.contains("years old"));
        assert!(!prompt.contains("Conversation so far"));
    }

    #[test]
    fn test_title_prompt_truncates_long_messages() {
        let long = "a".repeat(500);
        let prompt = build_title_prompt(&long, "short reply");
        assert!(prompt.contains(&format!("User: {}\n", "a".repeat(200))));
        assert!(!prompt.contains(&"a".repeat(201)));
        assert!(prompt.contains("Assistant: short reply"));
    }

    #[test]
    fn test_provider_builds_with_custom_url() {
        let config = LlmConfig {
            base_url: Some("http://127.0.0.1:11434".to_string()),
            ..LlmConfig::default()
        };
        assert!(OllamaProvider::new(config).is_ok());
    }
}
