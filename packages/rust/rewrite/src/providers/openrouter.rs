//! OpenRouter chat completions.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use blogrefresh_shared::{BlogRefreshError, OpenRouterConfig, Result};

use super::{TextGenerator, build_client, error_for_status, non_empty, trim_base};
use crate::prompt::Prompt;

const NAME: &str = "openrouter";

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Generator backed by `POST /api/v1/chat/completions`.
pub struct OpenRouterGenerator {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    site_url: String,
    app_name: String,
}

impl OpenRouterGenerator {
    pub fn new(
        config: &OpenRouterConfig,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: format!("{}/api/v1/chat/completions", trim_base(&config.base_url)),
            api_key: api_key.into(),
            model: config.model.clone(),
            site_url: config.site_url.clone(),
            app_name: config.app_name.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenRouterGenerator {
    fn name(&self) -> &str {
        NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .header("HTTP-Referer", &self.site_url)
            .header("X-Title", &self.app_name)
            .json(&body)
            .send()
            .await
            .map_err(|e| BlogRefreshError::transport(format!("OpenRouter request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(error_for_status("OpenRouter", response).await);
        }

        let reply: ChatReply = response
            .json()
            .await
            .map_err(|e| BlogRefreshError::parse(format!("invalid OpenRouter response: {e}")))?;

        let text = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default();
        debug!(chars = text.len(), "generation received");
        non_empty(NAME, text)
    }
}
