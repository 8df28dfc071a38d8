//! Blog index parsing: pagination, article links, and page titles.
//!
//! Used when seeding the store with the oldest posts of the source blog.
//! The index lives at a path such as `/blogs/`, listing pages at
//! `/blogs/page/N/`, and posts at `/blogs/<slug>/`.

use std::collections::HashSet;

use regex::RegexBuilder;
use scraper::{Html, Selector};
use url::Url;

/// Selectors that point at post title links on a listing page.
const ARTICLE_LINK_SELECTORS: &[&str] = &[
    ".elementor-post__title a[href]",
    ".entry-title a[href]",
    r#"article a[rel="bookmark"][href]"#,
    r#"a[rel="bookmark"][href]"#,
    "h2 a[href]",
    "h3 a[href]",
];

/// Second path segments that are archive pages rather than posts.
const NON_ARTICLE_SEGMENTS: &[&str] = &["page", "category", "tag", "author"];

/// URL of listing page `page` (1-based) under the blog index.
pub fn listing_page_url(index: &Url, page: u32) -> String {
    if page <= 1 {
        return index.to_string();
    }
    let base = index.as_str().trim_end_matches('/');
    format!("{base}/page/{page}/")
}

/// Highest listing page number linked from the index, at least 1.
///
/// Recognises `/<index>/page/N/` paths and `?paged=N` / `?page=N` params
/// on links that stay on the index host.
pub fn last_page_number(index_html: &str, index: &Url) -> u32 {
    let prefix = index_prefix(index);
    let Ok(page_re) = RegexBuilder::new(&format!(r"^{}/page/(\d+)/?$", regex::escape(&prefix)))
        .case_insensitive(true)
        .build()
    else {
        return 1;
    };

    let doc = Html::parse_document(index_html);
    let link_sel = Selector::parse("a[href]").expect("valid selector");
    let mut max_page = 1;

    for el in doc.select(&link_sel) {
        let Some(url) = el.value().attr("href").and_then(|h| index.join(h).ok()) else {
            continue;
        };
        if url.host_str() != index.host_str() || !url.path().starts_with(&prefix) {
            continue;
        }

        let from_path = page_re
            .captures(url.path())
            .and_then(|caps| caps[1].parse::<u32>().ok());
        let from_query = || {
            url.query_pairs()
                .find(|(k, _)| k == "paged")
                .or_else(|| url.query_pairs().find(|(k, _)| k == "page"))
                .and_then(|(_, v)| v.parse::<u32>().ok())
        };

        if let Some(page) = from_path.or_else(from_query) {
            max_page = max_page.max(page);
        }
    }

    max_page
}

/// Post links on a listing page, canonicalised and in document order.
///
/// Canonical form drops query and fragment and ends with `/`. Only links
/// exactly one segment below the index path on the index host are kept.
pub fn article_links(listing_html: &str, index: &Url) -> Vec<String> {
    let doc = Html::parse_document(listing_html);
    let main_sel = Selector::parse("main").expect("valid selector");
    let body_sel = Selector::parse("body").expect("valid selector");
    let link_sel = Selector::parse(&ARTICLE_LINK_SELECTORS.join(", ")).expect("valid selector");

    let Some(root) = doc
        .select(&main_sel)
        .next()
        .or_else(|| doc.select(&body_sel).next())
    else {
        return Vec::new();
    };

    let prefix_segments: Vec<String> = index_prefix(index)
        .split('/')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for el in root.select(&link_sel) {
        let Some(mut url) = el.value().attr("href").and_then(|h| index.join(h).ok()) else {
            continue;
        };
        if url.host_str() != index.host_str() {
            continue;
        }

        let segments: Vec<&str> = url.path().split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() != prefix_segments.len() + 1
            || segments[..prefix_segments.len()] != prefix_segments[..]
        {
            continue;
        }
        let slug = segments[prefix_segments.len()].to_ascii_lowercase();
        if NON_ARTICLE_SEGMENTS.contains(&slug.as_str()) {
            continue;
        }

        url.set_query(None);
        url.set_fragment(None);
        let canonical = format!("{}/", url.as_str().trim_end_matches('/'));

        if seen.insert(canonical.clone()) {
            links.push(canonical);
        }
    }

    links
}

/// Take up to `limit` links from the bottom of a listing page (oldest first),
/// skipping any already picked.
pub fn pick_oldest(links: &[String], limit: usize, picked: &mut HashSet<String>) -> Vec<String> {
    let mut out = Vec::new();
    for link in links.iter().rev() {
        if out.len() >= limit {
            break;
        }
        if picked.insert(link.clone()) {
            out.push(link.clone());
        }
    }
    out
}

/// Page title: first `<h1>`, else `og:title`, else `<title>`.
pub fn extract_title(doc: &Html) -> String {
    let h1_sel = Selector::parse("h1").expect("valid selector");
    let og_sel = Selector::parse(r#"meta[property="og:title"]"#).expect("valid selector");
    let title_sel = Selector::parse("title").expect("valid selector");

    let h1 = doc
        .select(&h1_sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());
    if let Some(h1) = h1 {
        return h1;
    }

    let og = doc
        .select(&og_sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|t| !t.is_empty());
    if let Some(og) = og {
        return og;
    }

    doc.select(&title_sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Index path without its trailing slash, e.g. `/blogs`.
fn index_prefix(index: &Url) -> String {
    index.path().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    fn index() -> Url {
        Url::parse("https://beyondchats.com/blogs/").unwrap()
    }

    #[test]
    fn listing_urls() {
        assert_eq!(listing_page_url(&index(), 1), "https://beyondchats.com/blogs/");
        assert_eq!(listing_page_url(&index(), 15), "https://beyondchats.com/blogs/page/15/");
    }

    #[test]
    fn finds_last_page_on_same_host() {
        let html = load_fixture("blog-index.html");
        assert_eq!(last_page_number(&html, &index()), 15);
    }

    #[test]
    fn last_page_defaults_to_one() {
        assert_eq!(last_page_number("<html><body></body></html>", &index()), 1);
    }

    #[test]
    fn query_param_pagination() {
        let html = r#"<a href="/blogs/?paged=7">7</a><a href="/blogs/?page=4">4</a>"#;
        assert_eq!(last_page_number(html, &index()), 7);
    }

    #[test]
    fn article_links_are_canonical_and_filtered() {
        let html = load_fixture("blog-listing-last.html");
        let links = article_links(&html, &index());
        assert_eq!(
            links,
            vec![
                "https://beyondchats.com/blogs/chatbots-for-clinics/".to_string(),
                "https://beyondchats.com/blogs/why-live-chat/".to_string(),
                "https://beyondchats.com/blogs/introducing-beyondchats/".to_string(),
            ]
        );
    }

    #[test]
    fn index_links_strip_query_and_fragment() {
        let html = load_fixture("blog-index.html");
        let links = article_links(&html, &index());
        assert_eq!(links.len(), 2);
        assert_eq!(links[1], "https://beyondchats.com/blogs/second-newest/");
    }

    #[test]
    fn oldest_are_picked_bottom_up_without_repeats() {
        let links: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let mut picked = HashSet::new();
        picked.insert("c".to_string());

        let out = pick_oldest(&links, 2, &mut picked);
        assert_eq!(out, vec!["b".to_string(), "a".to_string()]);
        assert!(pick_oldest(&links, 5, &mut picked).is_empty());
    }

    #[test]
    fn title_fallbacks() {
        let doc = Html::parse_document(&load_fixture("blog-post.html"));
        assert_eq!(extract_title(&doc), "Cloud Backup Guide");

        let doc = Html::parse_document(
            r#"<html><head><meta property="og:title" content=" OG Title "><title>Tag</title></head><body></body></html>"#,
        );
        assert_eq!(extract_title(&doc), "OG Title");

        let doc = Html::parse_document("<html><head><title> Tag </title></head></html>");
        assert_eq!(extract_title(&doc), "Tag");
    }
}
