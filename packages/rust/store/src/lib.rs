//! Article store client and derivative publishing.
//!
//! The store is a small REST API over article records:
//!
//! | Method | Path | Result |
//! |--------|------|--------|
//! | GET    | `/api/articles` | all articles, newest first |
//! | GET    | `/api/articles/:id` | one article or 404 |
//! | POST   | `/api/articles` | 201 created, 400 invalid, 409 duplicate slug |
//! | PUT    | `/api/articles/:id` | updated article or 404 |
//! | DELETE | `/api/articles/:id` | 200 or 404 |
//! | POST   | `/api/articles/extract-oldest` | seeds originals server-side |

mod publish;
mod slug;

use std::collections::HashSet;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use blogrefresh_shared::{
    Article, BlogRefreshError, NewArticle, Reference, Result, StoreConfig,
};

pub use publish::{PublishRequest, Publisher};
pub use slug::slugify;

/// User-Agent string for store requests.
const USER_AGENT: &str = concat!("blogrefresh/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Partial update for `PUT /api/articles/:id`. Unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<Reference>>,
}

/// Reply of the store's `extract-oldest` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractOldestResponse {
    #[serde(default)]
    pub originals: Vec<Article>,
    #[serde(default)]
    pub meta: ExtractMeta,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractMeta {
    #[serde(default)]
    pub saved: usize,
    #[serde(default)]
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Pure selection helpers
// ---------------------------------------------------------------------------

/// Ids of originals that already have a derivative.
pub fn updated_ids(articles: &[Article]) -> HashSet<String> {
    articles
        .iter()
        .filter(|a| a.is_derivative())
        .filter_map(|a| a.original_article_id.clone())
        .collect()
}

/// Originals in store order, optionally without those already rewritten.
pub fn select_originals(articles: Vec<Article>, exclude_updated: bool) -> Vec<Article> {
    let updated = if exclude_updated {
        updated_ids(&articles)
    } else {
        HashSet::new()
    };

    articles
        .into_iter()
        .filter(|a| !a.is_updated_version)
        .filter(|a| !updated.contains(&a.id))
        .collect()
}

// ---------------------------------------------------------------------------
// ArticleStore
// ---------------------------------------------------------------------------

/// HTTP client for the article store.
#[derive(Debug, Clone)]
pub struct ArticleStore {
    client: Client,
    base_url: String,
}

impl ArticleStore {
    /// Build from the `[store]` section. Fails when neither a base URL nor a
    /// port is configured.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Self::new(config.resolved_base_url()?, Duration::from_secs(config.timeout_secs))
    }

    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(BlogRefreshError::config("article store base URL is empty"));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| BlogRefreshError::transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn articles_url(&self) -> String {
        format!("{}/api/articles", self.base_url)
    }

    fn article_url(&self, id: &str) -> Result<String> {
        let id = id.trim();
        if id.is_empty() {
            return Err(BlogRefreshError::validation("id is required"));
        }
        Ok(format!("{}/{id}", self.articles_url()))
    }

    /// All articles, in store order.
    #[instrument(skip(self), fields(store = %self.base_url))]
    pub async fn list_articles(&self) -> Result<Vec<Article>> {
        let url = self.articles_url();
        let articles: Vec<Article> = self.send(self.client.get(&url), "GET", &url).await?;
        debug!(count = articles.len(), "articles listed");
        Ok(articles)
    }

    /// One article. A 404 becomes [`BlogRefreshError::NotFound`].
    #[instrument(skip(self), fields(store = %self.base_url))]
    pub async fn get_article(&self, id: &str) -> Result<Article> {
        let url = self.article_url(id)?;
        self.send(self.client.get(&url), "GET", &url)
            .await
            .map_err(|e| not_found_as(e, id))
    }

    /// Create an article and return the stored record.
    #[instrument(skip_all, fields(store = %self.base_url, slug = %article.slug))]
    ///
    /// A 2xx reply whose body is not an article still means the record was
    /// created; the payload is returned with whatever id the reply carries.
    pub async fn create_article(&self, article: &NewArticle) -> Result<Article> {
        let url = self.articles_url();
        let response = self
            .send_checked(self.client.post(&url).json(article), "POST", &url)
            .await?;
        let body = response.text().await.unwrap_or_default();

        match serde_json::from_str::<Article>(&body) {
            Ok(created) => Ok(created),
            Err(e) => {
                let id = reply_id(&body);
                warn!(
                    error = %e,
                    id = id.as_deref().unwrap_or(""),
                    "store accepted the article but the reply is not an article"
                );
                Ok(accepted_article(article, id.unwrap_or_default()))
            }
        }
    }

    /// Apply a partial update.
    #[instrument(skip(self, update), fields(store = %self.base_url))]
    pub async fn update_article(&self, id: &str, update: &ArticleUpdate) -> Result<Article> {
        let url = self.article_url(id)?;
        self.send(self.client.put(&url).json(update), "PUT", &url)
            .await
            .map_err(|e| not_found_as(e, id))
    }

    #[instrument(skip(self), fields(store = %self.base_url))]
    pub async fn delete_article(&self, id: &str) -> Result<()> {
        let url = self.article_url(id)?;
        let _: serde_json::Value = self
            .send(self.client.delete(&url), "DELETE", &url)
            .await
            .map_err(|e| not_found_as(e, id))?;
        info!(id, "article deleted");
        Ok(())
    }

    /// Originals in store order; with `exclude_updated`, only those that
    /// have no derivative yet.
    pub async fn fetch_originals(&self, exclude_updated: bool) -> Result<Vec<Article>> {
        let articles = self.list_articles().await?;
        Ok(select_originals(articles, exclude_updated))
    }

    /// Ids of originals that already have a derivative.
    pub async fn updated_original_ids(&self) -> Result<HashSet<String>> {
        let articles = self.list_articles().await?;
        Ok(updated_ids(&articles))
    }

    /// Ask the store to scrape and save the oldest source posts.
    #[instrument(skip(self), fields(store = %self.base_url))]
    pub async fn extract_oldest(&self, limit: u32) -> Result<ExtractOldestResponse> {
        let url = format!("{}/extract-oldest", self.articles_url());
        let body = serde_json::json!({ "limit": limit });
        let reply: ExtractOldestResponse =
            self.send(self.client.post(&url).json(&body), "POST", &url).await?;

        info!(
            saved = reply.meta.saved,
            skipped = reply.meta.skipped,
            originals = reply.originals.len(),
            "extract-oldest complete"
        );
        Ok(reply)
    }

    /// Send a request and decode a JSON body from a 2xx response.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        method: &str,
        url: &str,
    ) -> Result<T> {
        self.send_checked(request, method, url)
            .await?
            .json()
            .await
            .map_err(|e| BlogRefreshError::parse(format!("{method} {url}: invalid JSON: {e}")))
    }

    /// Send a request and fail on connection errors or non-2xx statuses.
    async fn send_checked(
        &self,
        request: RequestBuilder,
        method: &str,
        url: &str,
    ) -> Result<Response> {
        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                BlogRefreshError::transport(format!(
                    "{method} {url} failed ({e}). Is the article store running at {}?",
                    self.base_url
                ))
            })?;

        check_status(response, method, url).await
    }
}

/// `_id` or `id` of a JSON reply, at the top level or under `article`.
fn reply_id(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let record = value.get("article").unwrap_or(&value);
    record
        .get("_id")
        .or_else(|| record.get("id"))
        .and_then(|id| id.as_str())
        .map(String::from)
}

fn accepted_article(payload: &NewArticle, id: String) -> Article {
    Article {
        id,
        title: payload.title.clone(),
        slug: payload.slug.clone(),
        original_url: payload.original_url.clone(),
        content: payload.content.clone(),
        is_updated_version: payload.is_updated_version,
        original_article_id: payload.original_article_id.clone(),
        references: payload.references.clone(),
        created_at: None,
    }
}

async fn check_status(response: Response, method: &str, url: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BlogRefreshError::http(format!("{method} {url}"), status.as_u16(), body))
}

fn not_found_as(err: BlogRefreshError, id: &str) -> BlogRefreshError {
    if err.status() == 404 {
        BlogRefreshError::NotFound(format!("article {}", id.trim()))
    } else {
        err
    }
}
