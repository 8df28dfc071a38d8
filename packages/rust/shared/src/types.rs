//! Core domain types: articles, references, and run-level enums.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{BlogRefreshError, Result};

// ---------------------------------------------------------------------------
// Article
// ---------------------------------------------------------------------------

/// An article record as returned by the article store.
///
/// Originals have `is_updated_version == false` and no `original_article_id`.
/// Derivatives point back at the original they rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    /// Store-assigned identifier.
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub slug: String,
    /// Source page on the scraped blog (originals only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_updated_version: bool,
    /// Set only on derivatives. Accepts a bare id or a populated `{ "_id": .. }`.
    #[serde(default, deserialize_with = "deserialize_id_ref")]
    pub original_article_id: Option<String>,
    #[serde(default)]
    pub references: Vec<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Article {
    /// True for a derivative that points at an original.
    pub fn is_derivative(&self) -> bool {
        self.is_updated_version && self.original_article_id.is_some()
    }
}

/// Creation payload for `POST /api/articles`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewArticle {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub is_updated_version: bool,
    pub original_article_id: Option<String>,
    pub references: Vec<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
}

/// Accept `"abc"`, `{ "_id": "abc" }`, `{ "$oid": "abc" }`, or null.
fn deserialize_id_ref<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| id_string(&v)).filter(|s| !s.is_empty()))
}

fn id_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(map) => map
            .get("_id")
            .or_else(|| map.get("$oid"))
            .and_then(id_string),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

/// An external page used as a stylistic source for a rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

/// A reference whose main content has been scraped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceArticle {
    pub title: String,
    pub url: String,
    pub content: String,
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Output format requested from the rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewriteFormat {
    #[default]
    Markdown,
    Html,
}

impl RewriteFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
        }
    }
}

impl std::str::FromStr for RewriteFormat {
    type Err = BlogRefreshError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            other => Err(BlogRefreshError::config(format!(
                "unsupported rewrite format: {other} (expected markdown or html)"
            ))),
        }
    }
}

impl std::fmt::Display for RewriteFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The text-generation backend used by the rewrite engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[serde(rename = "openai")]
    OpenAi,
    Gemini,
    #[serde(rename = "openrouter")]
    OpenRouter,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::OpenRouter => "openrouter",
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = BlogRefreshError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            "openrouter" => Ok(Self::OpenRouter),
            _ => Err(BlogRefreshError::config(format!("Unsupported provider: {s}"))),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the content extractor returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Text,
    Html,
}

impl std::str::FromStr for OutputMode {
    type Err = BlogRefreshError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "html" => Ok(Self::Html),
            other => Err(BlogRefreshError::validation(format!(
                "unsupported output mode: {other} (expected text or html)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// RunSummary
// ---------------------------------------------------------------------------

/// Aggregate counts for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Originals visited (including skipped ones).
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}
