//! Publishing rewritten articles as derivatives.

use tracing::{info, instrument};

use blogrefresh_shared::{Article, BlogRefreshError, NewArticle, Reference, Result};

use crate::ArticleStore;
use crate::slug::slugify;

/// Input for [`Publisher::publish`].
#[derive(Debug, Clone, Default)]
pub struct PublishRequest {
    pub title: String,
    pub content: String,
    pub original_article_id: String,
    pub references: Vec<Reference>,
}

impl PublishRequest {
    /// Validate and build the creation payload for a derivative.
    ///
    /// Fields are trimmed first. A missing field or an empty slug is a
    /// validation error.
    pub fn to_new_article(&self) -> Result<NewArticle> {
        let title = required(&self.title, "title")?;
        let content = required(&self.content, "content")?;
        let original_article_id = required(&self.original_article_id, "originalArticleId")?;

        let slug = slugify(&title);
        if slug.is_empty() {
            return Err(BlogRefreshError::validation("unable to generate slug from title"));
        }

        Ok(NewArticle {
            title,
            slug,
            content,
            is_updated_version: true,
            original_article_id: Some(original_article_id),
            references: self.references.clone(),
            original_url: None,
        })
    }
}

fn required(value: &str, field: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(BlogRefreshError::validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// Creates derivative articles in the store.
#[derive(Debug, Clone)]
pub struct Publisher {
    store: ArticleStore,
}

impl Publisher {
    pub fn new(store: ArticleStore) -> Self {
        Self { store }
    }

    /// Validate `request` and create the derivative.
    ///
    /// Validation failures never reach the network. Store rejections keep
    /// their HTTP status (e.g. 409 for a duplicate slug); see
    /// [`BlogRefreshError::status`].
    #[instrument(skip_all, fields(original_id = %request.original_article_id.trim()))]
    pub async fn publish(&self, request: &PublishRequest) -> Result<Article> {
        let payload = request.to_new_article()?;
        let created = self.store.create_article(&payload).await?;

        info!(id = %created.id, slug = %created.slug, "derivative published");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn request() -> PublishRequest {
        PublishRequest {
            title: " Cloud Backup Guide (Updated) ".into(),
            content: "## Rewritten".into(),
            original_article_id: "orig-1".into(),
            references: vec![Reference {
                title: "Ref".into(),
                url: "https://a.example/blog/x".into(),
            }],
        }
    }

    fn publisher(server: &MockServer) -> Publisher {
        Publisher::new(ArticleStore::new(server.uri(), Duration::from_secs(5)).unwrap())
    }

    #[test]
    fn payload_is_a_trimmed_derivative() {
        let payload = request().to_new_article().unwrap();
        assert_eq!(payload.title, "Cloud Backup Guide (Updated)");
        assert_eq!(payload.slug, "cloud-backup-guide-updated");
        assert!(payload.is_updated_version);
        assert_eq!(payload.original_article_id.as_deref(), Some("orig-1"));
        assert_eq!(payload.references.len(), 1);
    }

    #[test]
    fn validation_order_and_messages() {
        let mut req = request();
        req.title = "  ".into();
        req.content = String::new();
        assert_eq!(req.to_new_article().unwrap_err().message(), "title is required");

        let mut req = request();
        req.content = "\n".into();
        assert_eq!(req.to_new_article().unwrap_err().message(), "content is required");

        let mut req = request();
        req.title = "!!!".into();
        let err = req.to_new_article().unwrap_err();
        assert_eq!(err.message(), "unable to generate slug from title");
        assert_eq!(err.status(), 400);
    }

    #[tokio::test]
    async fn blank_original_id_makes_no_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let mut req = request();
        req.original_article_id = String::new();

        let err = publisher(&server).publish(&req).await.unwrap_err();
        assert!(matches!(err, BlogRefreshError::Validation { .. }));
        assert_eq!(err.status(), 400);
        assert_eq!(err.message(), "originalArticleId is required");
    }

    #[tokio::test]
    async fn creates_derivative() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/articles"))
            .and(body_partial_json(serde_json::json!({
                "title": "Cloud Backup Guide (Updated)",
                "slug": "cloud-backup-guide-updated",
                "isUpdatedVersion": true,
                "originalArticleId": "orig-1",
                "references": [{ "title": "Ref", "url": "https://a.example/blog/x" }]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "_id": "new-1",
                "title": "Cloud Backup Guide (Updated)",
                "slug": "cloud-backup-guide-updated",
                "content": "## Rewritten",
                "isUpdatedVersion": true,
                "originalArticleId": "orig-1",
                "references": [{ "title": "Ref", "url": "https://a.example/blog/x" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let created = publisher(&server).publish(&request()).await.unwrap();
        assert_eq!(created.id, "new-1");
        assert!(created.is_derivative());
    }

    #[tokio::test]
    async fn duplicate_slug_keeps_store_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(serde_json::json!({ "message": "Duplicate key error" })),
            )
            .mount(&server)
            .await;

        let err = publisher(&server).publish(&request()).await.unwrap_err();
        assert_eq!(err.status(), 409);
        assert!(err.to_string().contains("Duplicate key error"));
    }
}
