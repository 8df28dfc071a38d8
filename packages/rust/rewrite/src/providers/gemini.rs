//! Gemini `generateContent`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use blogrefresh_shared::{BlogRefreshError, GeminiConfig, Result};

use super::{TextGenerator, build_client, error_for_status, non_empty, trim_base};
use crate::prompt::Prompt;

const NAME: &str = "gemini";

#[derive(Debug, Deserialize)]
struct GenerateReply {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateReply {
    /// Text of the first candidate, parts joined.
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default()
    }
}

/// Generator backed by `POST /v1beta/models/<model>:generateContent`.
///
/// Gemini takes a single user turn, so system and user text are combined.
pub struct GeminiGenerator {
    client: Client,
    endpoint: Url,
    model: String,
}

impl GeminiGenerator {
    pub fn new(config: &GeminiConfig, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base = trim_base(&config.base_url);
        let api_key: String = api_key.into();
        let method = format!("{}:generateContent", config.model);

        let mut endpoint = Url::parse(&base)
            .map_err(|e| BlogRefreshError::config(format!("invalid Gemini base_url '{base}': {e}")))?;
        endpoint
            .path_segments_mut()
            .map_err(|_| BlogRefreshError::config(format!("Gemini base_url '{base}' cannot take a path")))?
            .pop_if_empty()
            .extend(["v1beta", "models", method.as_str()]);
        endpoint.query_pairs_mut().append_pair("key", &api_key);

        Ok(Self {
            client: build_client(timeout)?,
            endpoint,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    fn name(&self) -> &str {
        NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let body = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [{ "text": prompt.combined() }] }
            ],
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| BlogRefreshError::transport(format!("Gemini request failed: {}", e.without_url())))?;

        if !response.status().is_success() {
            return Err(error_for_status("Gemini", response).await);
        }

        let reply: GenerateReply = response
            .json()
            .await
            .map_err(|e| BlogRefreshError::parse(format!("invalid Gemini response: {}", e.without_url())))?;

        let text = reply.text();
        debug!(chars = text.len(), "generation received");
        non_empty(NAME, text)
    }
}
