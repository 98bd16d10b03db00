//! Citations attached to bot answers.

use serde::{Deserialize, Serialize};

/// Free-form key/value metadata attached to a message or version.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A document or passage the answer provider cited.
///
/// Fields the provider adds beyond the known ones are kept in `extra` and
/// written back unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Human-readable document title.
    #[serde(default)]
    pub title: String,
    /// Location of the document, if it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Cited passage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    /// Retrieval relevance score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Unrecognized provider fields.
    #[serde(flatten)]
    pub extra: Metadata,
}

impl Source {
    /// Create a source with only a title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Set the document URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the cited passage.
    #[must_use]
    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = Some(excerpt.into());
        self
    }

    /// Set the relevance score.
    #[must_use]
    pub const fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}
