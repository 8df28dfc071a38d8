//! Reference search against a Google-results API (Serper).
//!
//! Given an article title, finds a small number of external blog/article
//! pages that the rewrite can use as stylistic references. Results are
//! filtered to article-looking paths and away from denied hosts.

mod filter;

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use blogrefresh_shared::{BlogRefreshError, Reference, Result, SearchConfig, resolve_api_key};

pub use filter::{DEFAULT_DENY_HOSTS, HostFilter, looks_like_article_url};

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("blogrefresh/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

// ---------------------------------------------------------------------------
// ReferenceSearch
// ---------------------------------------------------------------------------

/// Search client returning at most `max_results` qualifying references.
pub struct ReferenceSearch {
    client: Client,
    endpoint: String,
    api_key: String,
    results_per_query: u32,
    max_results: usize,
    hosts: HostFilter,
}

impl ReferenceSearch {
    /// Build from config, reading the API key from the configured env var.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let api_key = resolve_api_key(&config.api_key_env, "")?;
        Self::new(config, api_key)
    }

    /// Build with an explicit API key.
    pub fn new(config: &SearchConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(BlogRefreshError::config(format!(
                "{} is not set",
                config.api_key_env
            )));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BlogRefreshError::transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            results_per_query: config.results_per_query,
            max_results: config.max_references,
            hosts: HostFilter::new(&config.extra_deny_hosts),
        })
    }

    /// Run one search and return qualifying references in provider rank order.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn search(&self, query: &str) -> Result<Vec<Reference>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(BlogRefreshError::validation("search query is required"));
        }

        let body = serde_json::json!({ "q": query, "num": self.results_per_query });

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| BlogRefreshError::transport(format!("search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BlogRefreshError::http("search request", status.as_u16(), text));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| BlogRefreshError::parse(format!("invalid search response: {e}")))?;

        let references = self.select(parsed.organic);
        info!(query, found = references.len(), "search complete");
        Ok(references)
    }

    /// Keep results with article paths on allowed hosts, up to the limit.
    fn select(&self, organic: Vec<OrganicResult>) -> Vec<Reference> {
        let mut references = Vec::new();

        for item in organic {
            let Some(link) = item.link.as_deref().filter(|l| !l.trim().is_empty()) else {
                continue;
            };
            let Ok(url) = Url::parse(link.trim()) else {
                debug!(link, "unparseable result link");
                continue;
            };
            if !looks_like_article_url(&url) {
                continue;
            }
            if self.hosts.is_denied(url.host_str().unwrap_or("")) {
                debug!(%url, "denied host");
                continue;
            }

            references.push(Reference {
                title: item.title.unwrap_or_default().trim().to_string(),
                url: url.to_string(),
            });

            if references.len() >= self.max_results {
                break;
            }
        }

        references
    }
}
