//! Seeding the store with the oldest posts of the source blog.
//!
//! The blog lists newest posts first, so the oldest live at the bottom of
//! the last listing page. Pages are walked backwards until enough links
//! are picked, then each post is scraped and saved as an original.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{info, instrument, warn};
use url::Url;

use blogrefresh_extractor::ContentExtractor;
use blogrefresh_extractor::listing::{
    article_links, last_page_number, listing_page_url, pick_oldest,
};
use blogrefresh_shared::{Article, BlogRefreshError, NewArticle, Result};
use blogrefresh_store::{ArticleStore, slugify};

/// Upper bound on originals seeded per call.
pub const MAX_SEED_LIMIT: usize = 20;

/// Listing pages visited per call, counting failed fetches.
pub const MAX_LISTING_PAGES: usize = 10;

/// Result of [`Seeder::seed_oldest`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedReport {
    /// Originals created by this call.
    pub saved: usize,
    /// Posts skipped for an empty or already-stored slug.
    pub skipped: usize,
    /// Created originals plus existing ones matched by slug.
    pub originals: Vec<Article>,
    /// Last listing page found on the index; `None` when nothing was fetched.
    pub last_page: Option<u32>,
    /// True when the store already held enough seeded originals.
    pub from_store: bool,
}

/// Scrapes the source blog and creates originals in the store.
pub struct Seeder<'a> {
    store: &'a ArticleStore,
    extractor: &'a ContentExtractor,
    index: Url,
}

impl<'a> Seeder<'a> {
    pub fn new(store: &'a ArticleStore, extractor: &'a ContentExtractor, index_url: &str) -> Result<Self> {
        let mut index = Url::parse(index_url.trim())
            .map_err(|e| BlogRefreshError::config(format!("invalid blog index URL '{index_url}': {e}")))?;
        if !index.path().ends_with('/') {
            let path = format!("{}/", index.path());
            index.set_path(&path);
        }
        Ok(Self {
            store,
            extractor,
            index,
        })
    }

    /// Seed up to `limit` (clamped to 1..=20) of the oldest posts.
    #[instrument(skip(self), fields(index = %self.index))]
    pub async fn seed_oldest(&self, limit: usize) -> Result<SeedReport> {
        let limit = limit.clamp(1, MAX_SEED_LIMIT);
        let articles = self.store.list_articles().await?;

        let existing = self.seeded_originals(&articles, limit);
        if existing.len() == limit {
            info!(count = limit, "store already holds seeded originals");
            return Ok(SeedReport {
                originals: existing,
                from_store: true,
                ..SeedReport::default()
            });
        }

        let index_html = self.extractor.fetch_html(self.index.as_str()).await?;
        let last_page = last_page_number(&index_html, &self.index);
        info!(last_page, "blog index parsed");

        let mut picked = HashSet::new();
        let mut links = Vec::new();
        for page in (1..=last_page).rev().take(MAX_LISTING_PAGES) {
            if links.len() >= limit {
                break;
            }
            let html = if page == 1 {
                index_html.clone()
            } else {
                let page_url = listing_page_url(&self.index, page);
                match self.extractor.fetch_html(&page_url).await {
                    Ok(html) => html,
                    Err(e) => {
                        warn!(url = %page_url, error = %e, "listing page fetch failed");
                        continue;
                    }
                }
            };
            let on_page = article_links(&html, &self.index);
            links.extend(pick_oldest(&on_page, limit - links.len(), &mut picked));
        }

        let mut by_slug: HashMap<String, Article> = articles
            .into_iter()
            .filter(|a| !a.slug.is_empty())
            .map(|a| (a.slug.clone(), a))
            .collect();

        let mut report = SeedReport {
            last_page: Some(last_page),
            ..SeedReport::default()
        };

        for link in &links {
            let page = match self.extractor.scrape_page(link).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(url = %link, error = %e, "post scrape failed");
                    continue;
                }
            };

            let slug = slugify(&page.title);
            if slug.is_empty() {
                report.skipped += 1;
                continue;
            }
            if let Some(existing) = by_slug.get(&slug) {
                report.originals.push(existing.clone());
                report.skipped += 1;
                continue;
            }

            let original = NewArticle {
                title: page.title.clone(),
                slug: slug.clone(),
                content: page.content_html,
                is_updated_version: false,
                original_article_id: None,
                references: Vec::new(),
                original_url: Some(link.clone()),
            };
            match self.store.create_article(&original).await {
                Ok(created) => {
                    info!(url = %link, slug = %created.slug, "original saved");
                    by_slug.insert(slug, created.clone());
                    report.originals.push(created);
                    report.saved += 1;
                }
                Err(e) => warn!(url = %link, error = %e, "original not saved"),
            }
        }

        info!(saved = report.saved, skipped = report.skipped, picked = links.len(), "seeding complete");
        Ok(report)
    }

    /// Originals already scraped from this blog, oldest first.
    fn seeded_originals(&self, articles: &[Article], limit: usize) -> Vec<Article> {
        let prefix = self.index.as_str().to_ascii_lowercase();
        let mut seeded: Vec<Article> = articles
            .iter()
            .filter(|a| !a.is_updated_version)
            .filter(|a| {
                a.original_url
                    .as_deref()
                    .is_some_and(|u| u.to_ascii_lowercase().starts_with(&prefix))
            })
            .cloned()
            .collect();
        seeded.sort_by_key(|a| a.created_at);
        seeded.truncate(limit);
        seeded
    }
}
