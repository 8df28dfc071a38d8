//! The rewrite run: originals → references → scrape → rewrite → publish.
//!
//! Articles are handled one at a time. Per-article errors become counts in
//! the [`RunSummary`]; only failing to load the originals aborts a run.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use blogrefresh_extractor::ContentExtractor;
use blogrefresh_rewrite::RewriteEngine;
use blogrefresh_search::ReferenceSearch;
use blogrefresh_shared::{
    AppConfig, Article, OutputMode, PipelineSettings, Reference, ReferenceArticle, Result,
    RunSummary,
};
use blogrefresh_store::{ArticleStore, PublishRequest, Publisher};

use crate::dedup::TopicGate;

/// Suffix appended to an original's title to form the derivative's title.
pub const UPDATED_TITLE_SUFFIX: &str = " (Updated)";

/// Search queries tried for a title, in order.
pub fn query_variants(title: &str) -> [String; 4] {
    let title = title.trim();
    [
        title.to_string(),
        format!("\"{title}\" blog"),
        format!("\"{title}\" guide"),
        format!("\"{title}\" case study"),
    ]
}

// ---------------------------------------------------------------------------
// Outcomes and progress
// ---------------------------------------------------------------------------

/// Why an article was not rewritten.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// A derivative already exists.
    AlreadyUpdated,
    /// Too similar to a title processed earlier in the run.
    DuplicateTopic { previous: String, ratio: f64 },
    /// Fewer unique references than required.
    InsufficientReferences { found: usize },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyUpdated => f.write_str("already updated"),
            Self::DuplicateTopic { previous, ratio } => {
                write!(f, "similar topic to \"{previous}\" (overlap {ratio:.2})")
            }
            Self::InsufficientReferences { found } => {
                write!(f, "insufficient references ({found} found)")
            }
        }
    }
}

/// Terminal state of one article.
#[derive(Debug, Clone, PartialEq)]
pub enum ArticleOutcome {
    Succeeded { derivative_id: String },
    Failed { error: String },
    Skipped(SkipReason),
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called once the originals are loaded.
    fn started(&self, total: usize);
    /// Called before an article is handled. `index` is 1-based.
    fn article_started(&self, index: usize, total: usize, title: &str);
    /// Called with the article's terminal state.
    fn article_finished(&self, index: usize, total: usize, title: &str, outcome: &ArticleOutcome);
    /// Called when the run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn started(&self, _total: usize) {}
    fn article_started(&self, _index: usize, _total: usize, _title: &str) {}
    fn article_finished(&self, _index: usize, _total: usize, _title: &str, _outcome: &ArticleOutcome) {}
    fn done(&self, _summary: &RunSummary) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// State owned by a single [`Pipeline::run`] call.
struct RunState {
    gate: TopicGate,
    summary: RunSummary,
    eligible: usize,
}

impl RunState {
    fn record(&mut self, outcome: &ArticleOutcome) {
        match outcome {
            ArticleOutcome::Succeeded { .. } => self.summary.succeeded += 1,
            ArticleOutcome::Failed { .. } => self.summary.failed += 1,
            ArticleOutcome::Skipped(_) => self.summary.skipped += 1,
        }
    }
}

/// The wired-up collaborators for a rewrite run.
pub struct Pipeline {
    search: ReferenceSearch,
    extractor: ContentExtractor,
    rewrite: RewriteEngine,
    store: ArticleStore,
    publisher: Publisher,
    settings: PipelineSettings,
}

impl Pipeline {
    /// Build every component from config.
    ///
    /// Missing credentials or store location fail here, before any work.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let store = ArticleStore::from_config(&config.store)?;
        let search = ReferenceSearch::from_config(&config.search)?;
        let extractor = ContentExtractor::new(&config.extractor)?;
        let rewrite = RewriteEngine::from_config(&config.llm)?;

        Ok(Self::new(search, extractor, rewrite, store, config.pipeline.clone()))
    }

    pub fn new(
        search: ReferenceSearch,
        extractor: ContentExtractor,
        rewrite: RewriteEngine,
        store: ArticleStore,
        settings: PipelineSettings,
    ) -> Self {
        let publisher = Publisher::new(store.clone());
        Self {
            search,
            extractor,
            rewrite,
            store,
            publisher,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Rewrite every original that has no derivative yet.
    #[instrument(skip_all, fields(run_id = %Uuid::now_v7(), provider = self.rewrite.provider()))]
    pub async fn run(&self, progress: &dyn ProgressReporter) -> Result<RunSummary> {
        let originals = self.store.fetch_originals(true).await?;
        let already_updated = self.store.updated_original_ids().await?;
        let total = originals.len();

        info!(originals = total, already_updated = already_updated.len(), "run started");
        progress.started(total);

        let mut state = RunState {
            gate: TopicGate::new(self.settings.overlap_threshold),
            summary: RunSummary::default(),
            eligible: 0,
        };

        for (i, article) in originals.iter().enumerate() {
            let index = i + 1;
            let label = format!("{index}/{total}");
            state.summary.processed += 1;
            progress.article_started(index, total, &article.title);

            let (outcome, reached_reference_check) =
                self.process_article(article, &already_updated, &mut state, &label).await;

            state.record(&outcome);
            log_outcome(&label, article, &outcome);
            progress.article_finished(index, total, &article.title, &outcome);

            if self.settings.process_only_one && state.eligible > 0 {
                info!(label = %label, "single-article mode: stopping after first eligible article");
                break;
            }
            if reached_reference_check {
                pause(self.settings.article_delay_ms).await;
            }
        }

        let summary = state.summary;
        info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "run complete"
        );
        progress.done(&summary);
        Ok(summary)
    }

    /// Handle one original. The flag reports whether the reference search ran.
    async fn process_article(
        &self,
        article: &Article,
        already_updated: &HashSet<String>,
        state: &mut RunState,
        label: &str,
    ) -> (ArticleOutcome, bool) {
        if already_updated.contains(&article.id) {
            return (ArticleOutcome::Skipped(SkipReason::AlreadyUpdated), false);
        }

        if let Some(similar) = state.gate.admit(&article.title) {
            let reason = SkipReason::DuplicateTopic {
                previous: similar.previous,
                ratio: similar.ratio,
            };
            return (ArticleOutcome::Skipped(reason), false);
        }

        let references = self.find_references(&article.title).await;
        info!(label, found = references.len(), "references found");
        if references.len() < self.settings.min_references {
            let reason = SkipReason::InsufficientReferences {
                found: references.len(),
            };
            return (ArticleOutcome::Skipped(reason), true);
        }
        state.eligible += 1;

        let outcome = match self.rewrite_and_publish(article, &references, label).await {
            Ok(derivative) => ArticleOutcome::Succeeded {
                derivative_id: derivative.id,
            },
            Err(e) => ArticleOutcome::Failed {
                error: e.to_string(),
            },
        };
        (outcome, true)
    }

    /// Collect unique references across the query variants until
    /// `min_references` are found. Failed queries count as no results.
    #[instrument(skip(self))]
    pub async fn find_references(&self, title: &str) -> Vec<Reference> {
        let wanted = self.settings.min_references;
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for query in query_variants(title) {
            match self.search.search(&query).await {
                Ok(results) => {
                    for reference in results {
                        if reference.url.is_empty() || !seen.insert(reference.url.clone()) {
                            continue;
                        }
                        found.push(reference);
                        if found.len() >= wanted {
                            return found;
                        }
                    }
                }
                Err(e) => warn!(query = %query, error = %e, "search failed"),
            }
            pause(self.settings.query_delay_ms).await;
        }

        found
    }

    async fn rewrite_and_publish(
        &self,
        article: &Article,
        references: &[Reference],
        label: &str,
    ) -> Result<Article> {
        let selected = &references[..references.len().min(self.settings.min_references)];

        let mut scraped = Vec::with_capacity(selected.len());
        for reference in selected {
            match self.extractor.scrape(&reference.url, OutputMode::Text).await {
                Ok(content) => {
                    info!(label, url = %reference.url, "reference scraped");
                    scraped.push(ReferenceArticle {
                        title: reference.title.clone(),
                        url: reference.url.clone(),
                        content,
                    });
                }
                Err(e) => warn!(label, url = %reference.url, error = %e, "reference scrape failed"),
            }
        }

        let content = self
            .rewrite
            .rewrite(&article.title, &article.content, &scraped)
            .await?;
        info!(label, chars = content.len(), "rewritten");

        let request = PublishRequest {
            title: format!("{}{UPDATED_TITLE_SUFFIX}", article.title.trim()),
            content,
            original_article_id: article.id.clone(),
            references: selected.to_vec(),
        };
        self.publisher.publish(&request).await
    }
}

fn log_outcome(label: &str, article: &Article, outcome: &ArticleOutcome) {
    match outcome {
        ArticleOutcome::Succeeded { derivative_id } => {
            info!(label, id = %article.id, derivative = %derivative_id, "published updated article");
        }
        ArticleOutcome::Failed { error } => {
            warn!(label, id = %article.id, error = %error, "article failed");
        }
        ArticleOutcome::Skipped(reason) => {
            info!(label, id = %article.id, reason = %reason, "article skipped");
        }
    }
}

async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use blogrefresh_rewrite::{Prompt, TextGenerator};
    use blogrefresh_shared::{ExtractorConfig, RewriteFormat, SearchConfig};

    use super::*;

    struct StubGenerator;

    #[async_trait]
    impl TextGenerator for StubGenerator {
        fn name(&self) -> &str {
            "stub"
        }

        fn model(&self) -> &str {
            "stub-1"
        }

        async fn generate(&self, prompt: &Prompt) -> Result<String> {
            let title = prompt
                .user
                .lines()
                .nth(1)
                .unwrap_or_default()
                .trim_start_matches("TITLE: ")
                .to_string();
            Ok(format!("## {title}\n\nRewritten."))
        }
    }

    /// Records every callback as a line.
    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn started(&self, total: usize) {
            self.events.lock().unwrap().push(format!("started {total}"));
        }
        fn article_started(&self, index: usize, total: usize, title: &str) {
            self.events.lock().unwrap().push(format!("[{index}/{total}] {title}"));
        }
        fn article_finished(&self, index: usize, total: usize, _title: &str, outcome: &ArticleOutcome) {
            let tag = match outcome {
                ArticleOutcome::Succeeded { .. } => "ok".to_string(),
                ArticleOutcome::Failed { .. } => "failed".to_string(),
                ArticleOutcome::Skipped(reason) => format!("skipped: {reason}"),
            };
            self.events.lock().unwrap().push(format!("[{index}/{total}] {tag}"));
        }
        fn done(&self, summary: &RunSummary) {
            self.events.lock().unwrap().push(format!("done {}", summary.succeeded));
        }
    }

    fn settings() -> PipelineSettings {
        PipelineSettings {
            query_delay_ms: 0,
            article_delay_ms: 0,
            ..PipelineSettings::default()
        }
    }

    fn pipeline(server: &MockServer, settings: PipelineSettings) -> Pipeline {
        let search_config = SearchConfig {
            endpoint: format!("{}/search", server.uri()),
            ..SearchConfig::default()
        };
        Pipeline::new(
            ReferenceSearch::new(&search_config, "serper-key").unwrap(),
            ContentExtractor::new(&ExtractorConfig::default()).unwrap(),
            RewriteEngine::new(Box::new(StubGenerator), RewriteFormat::Markdown),
            ArticleStore::new(server.uri(), Duration::from_secs(5)).unwrap(),
            settings,
        )
    }

    fn original(id: &str, title: &str) -> serde_json::Value {
        serde_json::json!({
            "_id": id,
            "title": title,
            "slug": id,
            "content": format!("Original body of {title}."),
            "isUpdatedVersion": false,
            "originalArticleId": null,
            "references": []
        })
    }

    fn organic(server: &MockServer, slugs: &[&str]) -> serde_json::Value {
        let items: Vec<_> = slugs
            .iter()
            .map(|s| serde_json::json!({ "title": format!("Ref {s}"), "link": format!("{}/blog/{s}", server.uri()) }))
            .collect();
        serde_json::json!({ "organic": items })
    }

    async fn mount_articles(server: &MockServer, articles: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/api/articles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(articles))
            .mount(server)
            .await;
    }

    async fn mount_reference_pages(server: &MockServer) {
        Mock::given(method("GET"))
            .and(wiremock::matchers::path_regex(r"^/blog/.+"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><body><main><h1>Reference</h1><p>Useful   reference text.</p></main></body></html>",
            ))
            .mount(server)
            .await;
    }

    fn created(title: &str) -> ResponseTemplate {
        ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "_id": "derived-1",
            "title": title,
            "slug": "derived",
            "content": "c",
            "isUpdatedVersion": true,
            "originalArticleId": "o1"
        }))
    }

    #[test]
    fn variants_in_order() {
        let q = query_variants(" Cloud Backup Guide ");
        assert_eq!(q[0], "Cloud Backup Guide");
        assert_eq!(q[1], "\"Cloud Backup Guide\" blog");
        assert_eq!(q[2], "\"Cloud Backup Guide\" guide");
        assert_eq!(q[3], "\"Cloud Backup Guide\" case study");
    }

    #[tokio::test]
    async fn publishes_one_derivative_with_two_references() {
        let server = MockServer::start().await;
        mount_articles(&server, serde_json::json!([original("o1", "Cloud Backup Guide")])).await;
        mount_reference_pages(&server).await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(serde_json::json!({ "q": "Cloud Backup Guide" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(organic(&server, &["one", "two"])))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/articles"))
            .and(body_partial_json(serde_json::json!({
                "title": "Cloud Backup Guide (Updated)",
                "slug": "cloud-backup-guide-updated",
                "isUpdatedVersion": true,
                "originalArticleId": "o1",
                "references": [
                    { "title": "Ref one", "url": format!("{}/blog/one", server.uri()) },
                    { "title": "Ref two", "url": format!("{}/blog/two", server.uri()) }
                ]
            })))
            .respond_with(created("Cloud Backup Guide (Updated)"))
            .expect(1)
            .mount(&server)
            .await;

        let progress = RecordingProgress::default();
        let summary = pipeline(&server, settings()).run(&progress).await.unwrap();

        assert_eq!(
            summary,
            RunSummary {
                processed: 1,
                succeeded: 1,
                failed: 0,
                skipped: 0
            }
        );
        let events = progress.events.lock().unwrap();
        assert_eq!(events[0], "started 1");
        assert_eq!(events[2], "[1/1] ok");
    }

    #[tokio::test]
    async fn one_reference_after_all_variants_is_skipped() {
        let server = MockServer::start().await;
        mount_articles(&server, serde_json::json!([original("o1", "Cloud Backup Guide")])).await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(organic(&server, &["only"])))
            .expect(4)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/articles"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let progress = RecordingProgress::default();
        let summary = pipeline(&server, settings()).run(&progress).await.unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.skipped, 1);
        assert!(
            progress
                .events
                .lock()
                .unwrap()
                .contains(&"[1/1] skipped: insufficient references (1 found)".to_string())
        );
    }

    #[tokio::test]
    async fn similar_title_is_skipped_after_first_is_processed() {
        let server = MockServer::start().await;
        mount_articles(
            &server,
            serde_json::json!([
                original("o1", "10 Tips for Remote Work"),
                original("o2", "10 tips for remote work (2024 edition)")
            ]),
        )
        .await;
        mount_reference_pages(&server).await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(organic(&server, &["a", "b"])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/articles"))
            .and(body_partial_json(serde_json::json!({ "title": "10 Tips for Remote Work (Updated)" })))
            .respond_with(created("10 Tips for Remote Work (Updated)"))
            .expect(1)
            .mount(&server)
            .await;

        let summary = pipeline(&server, settings()).run(&SilentProgress).await.unwrap();
        assert_eq!(
            summary,
            RunSummary {
                processed: 2,
                succeeded: 1,
                failed: 0,
                skipped: 1
            }
        );
    }

    #[tokio::test]
    async fn rerun_after_finished_run_creates_nothing() {
        let server = MockServer::start().await;
        mount_articles(
            &server,
            serde_json::json!([
                {
                    "_id": "d1", "title": "Cloud Backup Guide (Updated)", "slug": "cloud-backup-guide-updated",
                    "content": "c", "isUpdatedVersion": true, "originalArticleId": "o1"
                },
                original("o1", "Cloud Backup Guide")
            ]),
        )
        .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let summary = pipeline(&server, settings()).run(&SilentProgress).await.unwrap();
        assert_eq!(summary, RunSummary::default());
    }

    #[tokio::test]
    async fn publish_failure_is_counted_and_run_continues() {
        let server = MockServer::start().await;
        mount_articles(
            &server,
            serde_json::json!([
                original("o1", "Cloud Backup Guide"),
                original("o2", "Negotiating a Raise")
            ]),
        )
        .await;
        mount_reference_pages(&server).await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(organic(&server, &["x", "y"])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/articles"))
            .and(body_partial_json(serde_json::json!({ "title": "Cloud Backup Guide (Updated)" })))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(serde_json::json!({ "message": "Duplicate key error" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/articles"))
            .and(body_partial_json(serde_json::json!({ "title": "Negotiating a Raise (Updated)" })))
            .respond_with(created("Negotiating a Raise (Updated)"))
            .expect(1)
            .mount(&server)
            .await;

        let summary = pipeline(&server, settings()).run(&SilentProgress).await.unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.succeeded, 1);
    }

    #[tokio::test]
    async fn failed_scrapes_and_searches_are_not_fatal() {
        let server = MockServer::start().await;
        mount_articles(&server, serde_json::json!([original("o1", "Cloud Backup Guide")])).await;

        Mock::given(method("GET"))
            .and(wiremock::matchers::path_regex(r"^/blog/.+"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(serde_json::json!({ "q": "Cloud Backup Guide" })))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(serde_json::json!({ "q": "\"Cloud Backup Guide\" blog" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(organic(&server, &["p", "q"])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/articles"))
            .respond_with(created("Cloud Backup Guide (Updated)"))
            .expect(1)
            .mount(&server)
            .await;

        let summary = pipeline(&server, settings()).run(&SilentProgress).await.unwrap();
        assert_eq!(summary.succeeded, 1);
    }

    #[tokio::test]
    async fn single_article_mode_stops_after_first_eligible() {
        let server = MockServer::start().await;
        mount_articles(
            &server,
            serde_json::json!([
                original("o1", "Cloud Backup Guide"),
                original("o2", "Negotiating a Raise")
            ]),
        )
        .await;
        mount_reference_pages(&server).await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(organic(&server, &["x", "y"])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/articles"))
            .respond_with(created("Cloud Backup Guide (Updated)"))
            .expect(1)
            .mount(&server)
            .await;

        let settings = PipelineSettings {
            process_only_one: true,
            ..settings()
        };
        let summary = pipeline(&server, settings).run(&SilentProgress).await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.succeeded, 1);
    }

    #[tokio::test]
    async fn store_failure_aborts_the_run() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/articles"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = pipeline(&server, settings()).run(&SilentProgress).await.unwrap_err();
        assert_eq!(err.status(), 500);
    }
}
