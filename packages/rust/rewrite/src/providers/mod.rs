//! Text-generation backends.
//!
//! Each provider is a single request/response call behind [`TextGenerator`].
//! [`create_generator`] picks one from config at construction time.

mod gemini;
mod openai;
mod openrouter;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::info;

use blogrefresh_shared::{BlogRefreshError, LlmConfig, LlmProvider, Result, resolve_api_key};

use crate::prompt::Prompt;

pub use gemini::GeminiGenerator;
pub use openai::OpenAiGenerator;
pub use openrouter::OpenRouterGenerator;

/// User-Agent string for LLM requests.
const USER_AGENT: &str = concat!("blogrefresh/", env!("CARGO_PKG_VERSION"));

/// A backend that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Provider name for logs, e.g. `openrouter`.
    fn name(&self) -> &str;

    /// Model identifier sent to the provider.
    fn model(&self) -> &str;

    /// Generate text for `prompt`. The result is trimmed and non-empty.
    async fn generate(&self, prompt: &Prompt) -> Result<String>;
}

/// Build the generator for the configured provider.
///
/// `config.model`, when set, replaces the provider's default model.
pub fn create_generator(config: &LlmConfig) -> Result<Box<dyn TextGenerator>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let model_override = config.model.as_deref().map(str::trim).filter(|m| !m.is_empty());

    let generator: Box<dyn TextGenerator> = match config.provider {
        LlmProvider::OpenAi => {
            let mut settings = config.openai.clone();
            if let Some(model) = model_override {
                settings.model = model.to_string();
            }
            let key = resolve_api_key(&settings.api_key_env, &missing_key_hint(LlmProvider::OpenAi))?;
            Box::new(OpenAiGenerator::new(&settings, key, timeout)?)
        }
        LlmProvider::Gemini => {
            let mut settings = config.gemini.clone();
            if let Some(model) = model_override {
                settings.model = model.to_string();
            }
            let key = resolve_api_key(&settings.api_key_env, &missing_key_hint(LlmProvider::Gemini))?;
            Box::new(GeminiGenerator::new(&settings, key, timeout)?)
        }
        LlmProvider::OpenRouter => {
            let mut settings = config.openrouter.clone();
            if let Some(model) = model_override {
                settings.model = model.to_string();
            }
            let key =
                resolve_api_key(&settings.api_key_env, &missing_key_hint(LlmProvider::OpenRouter))?;
            Box::new(OpenRouterGenerator::new(&settings, key, timeout)?)
        }
    };

    info!(provider = generator.name(), model = generator.model(), "text generator ready");
    Ok(generator)
}

/// Suggest the other providers when the active one has no key.
fn missing_key_hint(provider: LlmProvider) -> String {
    let alternatives: Vec<String> = [
        (LlmProvider::OpenAi, "OPENAI_API_KEY"),
        (LlmProvider::Gemini, "GEMINI_API_KEY"),
        (LlmProvider::OpenRouter, "OPENROUTER_API_KEY"),
    ]
    .into_iter()
    .filter(|(p, _)| *p != provider)
    .map(|(p, var)| format!("LLM_PROVIDER={p} with {var}"))
    .collect();

    format!("Set it, or switch provider: {}", alternatives.join(" or "))
}

// ---------------------------------------------------------------------------
// Shared HTTP helpers
// ---------------------------------------------------------------------------

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| BlogRefreshError::transport(format!("failed to build HTTP client: {e}")))
}

/// Base URL without a trailing slash.
fn trim_base(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Turn a non-2xx response into a transport error carrying status and body.
async fn error_for_status(provider: &str, response: Response) -> BlogRefreshError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    BlogRefreshError::http(format!("{provider} API request"), status, body)
}

/// Reject empty generations so a derivative never carries only an appendix.
fn non_empty(provider: &str, text: String) -> Result<String> {
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(BlogRefreshError::parse(format!("{provider} returned no text")));
    }
    Ok(text)
}
