//! OpenAI Responses API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use blogrefresh_shared::{BlogRefreshError, OpenAiConfig, Result};

use super::{TextGenerator, build_client, error_for_status, non_empty, trim_base};
use crate::prompt::Prompt;

const NAME: &str = "openai";

/// Raw `/v1/responses` body. SDKs add `output_text`; the REST reply carries
/// the text in `output[].content[]` parts of type `output_text`.
#[derive(Debug, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl ResponsesReply {
    fn into_text(self) -> String {
        if let Some(text) = self.output_text.filter(|t| !t.trim().is_empty()) {
            return text;
        }
        self.output
            .into_iter()
            .flat_map(|item| item.content)
            .filter(|part| part.kind == "output_text")
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Debug, Deserialize)]
struct ErrorReply {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
}

/// Generator backed by `POST /v1/responses`.
pub struct OpenAiGenerator {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(config: &OpenAiConfig, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: format!("{}/v1/responses", trim_base(&config.base_url)),
            api_key: api_key.into(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
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
            "input": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| BlogRefreshError::transport(format!("OpenAI request failed: {e}")))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let raw = response.text().await.unwrap_or_default();
            let code = serde_json::from_str::<ErrorReply>(&raw)
                .ok()
                .and_then(|r| r.error)
                .and_then(|e| e.code);
            if code.as_deref() == Some("insufficient_quota") {
                return Err(BlogRefreshError::config(
                    "OpenAI quota exceeded (insufficient_quota). Add billing/credits in the OpenAI dashboard or set LLM_PROVIDER=gemini with GEMINI_API_KEY.",
                ));
            }
            return Err(BlogRefreshError::http("OpenAI API request", 429, raw));
        }
        if !status.is_success() {
            return Err(error_for_status("OpenAI", response).await);
        }

        let reply: ResponsesReply = response
            .json()
            .await
            .map_err(|e| BlogRefreshError::parse(format!("invalid OpenAI response: {e}")))?;

        let text = reply.into_text();
        debug!(chars = text.len(), "generation received");
        non_empty(NAME, text)
    }
}
