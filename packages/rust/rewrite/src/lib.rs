//! LLM rewrite engine.
//!
//! Turns an original article plus scraped references into rewritten
//! content in the configured format, followed by a References section.
//! The text-generation backend is a [`TextGenerator`] chosen once from
//! config; the engine itself never branches on provider.

mod appendix;
mod prompt;
pub mod providers;

use tracing::{info, instrument};

use blogrefresh_shared::{BlogRefreshError, LlmConfig, ReferenceArticle, Result, RewriteFormat};

pub use appendix::references_appendix;
pub use prompt::{MAX_PROMPT_REFERENCES, Prompt, build_prompt, system_instructions};
pub use providers::{TextGenerator, create_generator};

/// Rewrites articles through a single text-generation backend.
pub struct RewriteEngine {
    generator: Box<dyn TextGenerator>,
    format: RewriteFormat,
}

impl RewriteEngine {
    /// Build the engine for the configured provider and format.
    ///
    /// Fails with a config error when the provider's API key is missing.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Ok(Self::new(create_generator(config)?, config.format))
    }

    pub fn new(generator: Box<dyn TextGenerator>, format: RewriteFormat) -> Self {
        Self { generator, format }
    }

    pub fn format(&self) -> RewriteFormat {
        self.format
    }

    /// Name of the active provider.
    pub fn provider(&self) -> &str {
        self.generator.name()
    }

    pub fn model(&self) -> &str {
        self.generator.model()
    }

    /// Rewrite an original article using `references` for tone and depth.
    ///
    /// At most [`MAX_PROMPT_REFERENCES`] references reach the prompt. The
    /// References section lists every reference with a URL.
    #[instrument(skip_all, fields(provider = self.generator.name(), format = %self.format, references = references.len()))]
    pub async fn rewrite(
        &self,
        title: &str,
        content: &str,
        references: &[ReferenceArticle],
    ) -> Result<String> {
        let title = title.trim();
        let content = content.trim();
        if title.is_empty() {
            return Err(BlogRefreshError::validation("original title is required"));
        }
        if content.is_empty() {
            return Err(BlogRefreshError::validation("original content is required"));
        }

        let prompt = build_prompt(title, content, references, self.format);
        let rewritten = self.generator.generate(&prompt).await?;

        info!(chars = rewritten.len(), "rewrite complete");
        Ok(rewritten + &references_appendix(references, self.format))
    }
}
