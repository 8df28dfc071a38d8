//! Result filtering: article-path detection and the host deny-list.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Hosts never used as references.
///
/// The source blog itself, social/video platforms, and paywalled academic
/// publishers. Subdomains of these are denied too.
pub const DEFAULT_DENY_HOSTS: &[&str] = &[
    "beyondchats.com",
    "linkedin.com",
    "youtube.com",
    "youtu.be",
    "sciencedirect.com",
    "springer.com",
    "ieee.org",
    "nature.com",
    "researchgate.net",
];

/// True when the URL path looks like a blog post or article.
pub fn looks_like_article_url(url: &Url) -> bool {
    static ARTICLE_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"/(blog|blogs|article|articles)\b").expect("valid regex")
    });

    ARTICLE_PATH_RE.is_match(&url.path().to_lowercase())
}

/// Host deny-list with subdomain matching.
#[derive(Debug, Clone)]
pub struct HostFilter {
    denied: Vec<String>,
}

impl HostFilter {
    /// Built-in deny-list plus `extra` hosts.
    pub fn new<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut denied: Vec<String> = DEFAULT_DENY_HOSTS.iter().map(|h| h.to_string()).collect();
        for host in extra {
            let host = normalize_host(host.as_ref());
            if !host.is_empty() && !denied.contains(&host) {
                denied.push(host);
            }
        }
        Self { denied }
    }

    /// True when `host` equals a denied host or is a subdomain of one.
    pub fn is_denied(&self, host: &str) -> bool {
        let host = normalize_host(host);
        self.denied
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{d}")))
    }

    pub fn denied_hosts(&self) -> &[String] {
        &self.denied
    }
}

impl Default for HostFilter {
    fn default() -> Self {
        Self::new(std::iter::empty::<&str>())
    }
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}
