//! Configuration for the conversation store and chat flow.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::conversation::core::errors::{ConversationError, ConversationResult};

/// Environment variable overriding the `SQLite` database path.
const SQLITE_PATH_ENV: &str = "CHATVAULT_SQLITE_PATH";
/// Environment variable overriding the Ollama base URL.
const OLLAMA_URL_ENV: &str = "CHATVAULT_OLLAMA_URL";
/// Environment variable overriding the completion model.
const MODEL_ENV: &str = "CHATVAULT_MODEL";
/// Environment variable providing a default age context.
const DEFAULT_AGE_ENV: &str = "CHATVAULT_DEFAULT_AGE";

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChatvaultConfig {
    /// Storage settings.
    pub storage: StorageConfig,
    /// Completion model settings.
    pub llm: LlmConfig,
    /// Chat flow settings.
    pub chat: ChatConfig,
}

impl ChatvaultConfig {
    /// Defaults overlaid with `CHATVAULT_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var(SQLITE_PATH_ENV) {
            config.storage.sqlite_path = PathBuf::from(path);
        }
        if let Ok(url) = std::env::var(OLLAMA_URL_ENV) {
            config.llm.base_url = Some(url);
        }
        if let Ok(model) = std::env::var(MODEL_ENV) {
            config.llm.model = model;
        }
        if let Some(age) = std::env::var(DEFAULT_AGE_ENV)
            .ok()
            .and_then(|value| value.parse().ok())
        {
            config.chat.default_age = Some(age);
        }

        config
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ConversationResult<()> {
        validate_table_name(&self.storage.conversation_table)?;

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConversationError::InvalidConfig(
                "llm.temperature must be in 0.0..=2.0".to_string(),
            ));
        }

        if self.chat.context_turns == 0 {
            return Err(ConversationError::InvalidConfig(
                "chat.context_turns must be > 0".to_string(),
            ));
        }

        if self.chat.title_max_chars == 0 {
            return Err(ConversationError::InvalidConfig(
                "chat.title_max_chars must be > 0".to_string(),
            ));
        }

        if let Some(base_url) = &self.llm.base_url {
            Url::parse(base_url)?;
        }

        Ok(())
    }
}

/// Check that a table name is safe to interpolate into SQL.
///
/// # Errors
/// Returns `InvalidConfig` if the name is empty or contains anything other
/// than ASCII alphanumerics and `_`.
pub fn validate_table_name(table: &str) -> ConversationResult<()> {
    if table.is_empty() {
        return Err(ConversationError::InvalidConfig(
            "storage.conversation_table must not be empty".to_string(),
        ));
    }

    if !table
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
    {
        return Err(ConversationError::InvalidConfig(
            "storage.conversation_table must be alphanumeric or '_'".to_string(),
        ));
    }

    Ok(())
}

/// Storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `SQLite` database path.
    pub sqlite_path: PathBuf,
    /// Conversation document table name.
    pub conversation_table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("chatvault.sqlite"),
            conversation_table: "conversations".to_string(),
        }
    }
}

/// Completion model settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Ollama completion model name.
    pub model: String,
    /// Temperature for generation.
    pub temperature: f64,
    /// Optional max tokens.
    pub max_tokens: Option<u64>,
    /// Optional custom base URL.
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "ministral-3:8b-instruct-2512-q8_0".to_string(),
            temperature: 0.4,
            max_tokens: None,
            base_url: None,
        }
    }
}

/// Chat flow settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Age context used when the conversation carries none.
    pub default_age: Option<u32>,
    /// Number of prior messages passed to the answer provider.
    pub context_turns: usize,
    /// Whether untitled conversations get a generated title.
    pub generate_titles: bool,
    /// Maximum title length in characters.
    pub title_max_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_age: None,
            context_turns: 6,
            generate_titles: true,
            title_max_chars: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ChatvaultConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_table_name() {
        let mut config = ChatvaultConfig::default();
        config.storage.conversation_table = "conversations; DROP".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConversationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_bad_url() {
        let mut config = ChatvaultConfig::default();
        config.llm.base_url = Some("not a url".to_string());
        assert!(matches!(config.validate(), Err(ConversationError::Url(_))));
    }

    #[test]
    fn test_rejects_out_of_range_temperature() {
        let mut config = ChatvaultConfig::default();
        config.llm.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_windows() {
        let mut config = ChatvaultConfig::default();
        config.chat.context_turns = 0;
        assert!(config.validate().is_err());

        let mut config = ChatvaultConfig::default();
        config.chat.title_max_chars = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_deserializes_from_json() {
        let json = serde_json::json!({
            "storage": { "sqlite_path": "/tmp/chat.sqlite", "conversation_table": "chats" },
            "llm": { "model": "llama3", "temperature": 0.2, "max_tokens": 256, "base_url": null },
            "chat": { "default_age": 12, "context_turns": 4, "generate_titles": false, "title_max_chars": 30 }
        });
        let config: ChatvaultConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.storage.conversation_table, "chats");
        assert_eq!(config.chat.default_age, Some(12));
        assert!(config.validate().is_ok());
    }
}
