//! Page fetching and main-content extraction.
//!
//! This crate provides:
//! - [`ContentExtractor`]: fetches a page and returns its cleaned main content
//! - [`ExtractionPolicy`]: the container priority list and boilerplate table
//! - [`listing`]: blog index parsing used when seeding originals

pub mod listing;
mod policy;

use std::time::Duration;

use reqwest::Client;
use scraper::{ElementRef, Html};
use tracing::{debug, instrument};

use blogrefresh_shared::{BlogRefreshError, ExtractorConfig, OutputMode, Result};

pub use policy::ExtractionPolicy;

/// Maximum number of redirects followed per fetch.
const MAX_REDIRECTS: usize = 5;

// ---------------------------------------------------------------------------
// Pure extraction
// ---------------------------------------------------------------------------

/// Extract the main content from a full HTML document.
///
/// Picks the first container the policy matches, detaches boilerplate
/// subtrees from it, and returns either its inner HTML or its text with
/// whitespace collapsed.
pub fn extract_main_content(html: &str, policy: &ExtractionPolicy, mode: OutputMode) -> String {
    let mut doc = Html::parse_document(html);
    let container_id = policy.select_container(&doc).id();

    let doomed: Vec<_> = match (policy.boilerplate(), doc.tree.get(container_id).and_then(ElementRef::wrap)) {
        (Some(sel), Some(container)) => container.select(sel).map(|el| el.id()).collect(),
        _ => Vec::new(),
    };
    for id in doomed {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }

    let Some(container) = doc.tree.get(container_id).and_then(ElementRef::wrap) else {
        return String::new();
    };

    match mode {
        OutputMode::Html => container.inner_html().trim().to_string(),
        OutputMode::Text => collapse_whitespace(&container.text().collect::<String>()),
    }
}

/// Collapse every whitespace run to a single space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// ContentExtractor
// ---------------------------------------------------------------------------

/// A fetched source page with its title and cleaned content HTML.
#[derive(Debug, Clone)]
pub struct ScrapedPage {
    pub url: String,
    pub title: String,
    pub content_html: String,
}

/// Fetches pages with a browser-like User-Agent and extracts main content.
pub struct ContentExtractor {
    client: Client,
    policy: ExtractionPolicy,
}

impl ContentExtractor {
    /// Create an extractor from the `[extractor]` config section.
    pub fn new(config: &ExtractorConfig) -> Result<Self> {
        let policy = ExtractionPolicy::from_config(config)?;
        Self::with_policy(config, policy)
    }

    /// Create an extractor with an explicit policy.
    pub fn with_policy(config: &ExtractorConfig, policy: ExtractionPolicy) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BlogRefreshError::transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, policy })
    }

    pub fn policy(&self) -> &ExtractionPolicy {
        &self.policy
    }

    /// Fetch raw HTML. Non-2xx responses are errors; there is no retry.
    #[instrument(skip(self))]
    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        let url = url.trim();
        if url.is_empty() {
            return Err(BlogRefreshError::validation("url is required"));
        }

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await
            .map_err(|e| BlogRefreshError::transport(format!("GET {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BlogRefreshError::http(format!("GET {url}"), status.as_u16(), body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| BlogRefreshError::transport(format!("{url}: body read failed: {e}")))?;

        debug!(url, bytes = body.len(), "page fetched");
        Ok(body)
    }

    /// Fetch `url` and return its cleaned main content.
    pub async fn scrape(&self, url: &str, mode: OutputMode) -> Result<String> {
        let html = self.fetch_html(url).await?;
        Ok(extract_main_content(&html, &self.policy, mode))
    }

    /// Fetch a source article: title plus main-content HTML.
    pub async fn scrape_page(&self, url: &str) -> Result<ScrapedPage> {
        let html = self.fetch_html(url).await?;
        let title = {
            let doc = Html::parse_document(&html);
            listing::extract_title(&doc)
        };
        let content_html = extract_main_content(&html, &self.policy, OutputMode::Html);

        Ok(ScrapedPage {
            url: url.trim().to_string(),
            title,
            content_html,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    #[test]
    fn text_mode_strips_boilerplate_and_collapses_whitespace() {
        let html = load_fixture("blog-post.html");
        let text = extract_main_content(&html, &ExtractionPolicy::default(), OutputMode::Text);

        assert!(text.starts_with("Cloud Backup Guide"));
        assert!(text.contains("Back up early. Back up often."));
        assert!(!text.contains("Site navigation"));
        assert!(!text.contains("Share this post"));
        assert!(!text.contains("trackVisitor"));
        assert!(!text.contains("  "));
        assert!(!text.contains('\n'));
    }

    #[test]
    fn html_mode_returns_cleaned_inner_html() {
        let html = load_fixture("blog-post.html");
        let out = extract_main_content(&html, &ExtractionPolicy::default(), OutputMode::Html);

        assert!(out.starts_with("<h1>"));
        assert!(out.contains("<p>"));
        assert!(!out.contains("<aside"));
        assert!(!out.contains("<script"));
        assert!(!out.contains("<main"));
    }

    #[test]
    fn class_based_container_is_found() {
        let html = load_fixture("entry-content.html");
        let text = extract_main_content(&html, &ExtractionPolicy::default(), OutputMode::Text);
        assert_eq!(text, "Remote teams need rituals. Write things down.");
    }

    #[test]
    fn body_fallback_still_drops_chrome() {
        let html = r#"<html><body>
            <header>Logo</header>
            <div><p>Only   body
            text</p></div>
            <footer>(c) 2024</footer>
            <noscript>enable js</noscript>
        </body></html>"#;
        let text = extract_main_content(html, &ExtractionPolicy::default(), OutputMode::Text);
        assert_eq!(text, "Only body text");
    }

    #[test]
    fn nested_boilerplate_inside_container_is_removed() {
        let html = r#"<html><body><article>
            <header><nav>crumbs</nav><h2>Kept?</h2></header>
            <p>Body</p>
            <style>p { color: red }</style>
        </article></body></html>"#;
        let text = extract_main_content(html, &ExtractionPolicy::default(), OutputMode::Text);
        assert_eq!(text, "Body");
    }

    #[test]
    fn custom_policy_table() {
        let html = r#"<html><body><div class="story"><p>Story</p><div class="ad">Buy</div></div><main>Main</main></body></html>"#;
        let policy = ExtractionPolicy::new([".story", "main"], [".ad"]).unwrap();
        let text = extract_main_content(html, &policy, OutputMode::Text);
        assert_eq!(text, "Story");
    }

    #[test]
    fn whitespace_collapse() {
        assert_eq!(collapse_whitespace("  a \n\t b\u{a0} c  "), "a b c");
        assert_eq!(collapse_whitespace("   "), "");
    }

    #[tokio::test]
    async fn scrape_with_mock_server() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/blog/cloud-backup"))
            .and(wiremock::matchers::headers(
                "accept",
                vec!["text/html", "application/xhtml+xml"],
            ))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_string(load_fixture("blog-post.html")),
            )
            .mount(&server)
            .await;

        let extractor = ContentExtractor::new(&ExtractorConfig::default()).unwrap();
        let url = format!("{}/blog/cloud-backup", server.uri());

        let text = extractor.scrape(&url, OutputMode::Text).await.unwrap();
        assert!(text.contains("Back up early."));

        let page = extractor.scrape_page(&url).await.unwrap();
        assert_eq!(page.title, "Cloud Backup Guide");
        assert!(page.content_html.contains("<p>"));
    }

    #[tokio::test]
    async fn non_success_status_is_transport_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::path("/gone"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let extractor = ContentExtractor::new(&ExtractorConfig::default()).unwrap();
        let err = extractor
            .scrape(&format!("{}/gone", server.uri()), OutputMode::Text)
            .await
            .unwrap_err();
        assert_eq!(err.status(), 404);
    }

    #[tokio::test]
    async fn blank_url_is_validation_error() {
        let extractor = ContentExtractor::new(&ExtractorConfig::default()).unwrap();
        let err = extractor.scrape("  ", OutputMode::Html).await.unwrap_err();
        assert!(matches!(err, BlogRefreshError::Validation { .. }));
    }
}
