//! Application configuration for blogrefresh.
//!
//! User config lives at `~/.blogrefresh/blogrefresh.toml`.
//! Environment variables override config file values, which override defaults.
//! CLI flags are applied last by the binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BlogRefreshError, Result};
use crate::types::{LlmProvider, RewriteFormat};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "blogrefresh.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".blogrefresh";

// ---------------------------------------------------------------------------
// Config structs (matching blogrefresh.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Article store API location.
    #[serde(default)]
    pub store: StoreConfig,

    /// Reference search provider settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Rewrite engine settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Main-content extraction policy.
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Orchestrator gates and throttles.
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Source blog used when seeding originals.
    #[serde(default)]
    pub seed: SeedConfig,
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Port of the article store on localhost. Overridden by `PORT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Full base URL; takes precedence over `port` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            port: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl StoreConfig {
    /// The store base URL, without a trailing slash.
    pub fn resolved_base_url(&self) -> Result<String> {
        if let Some(url) = self.base_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            return Ok(url.trim_end_matches('/').to_string());
        }
        match self.port {
            Some(port) => Ok(format!("http://localhost:{port}")),
            None => Err(BlogRefreshError::config(
                "PORT is not set (set PORT, ARTICLE_STORE_URL, or [store] in the config file)",
            )),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the env var holding the search API key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Search endpoint.
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Results requested per query.
    #[serde(default = "default_results_per_query")]
    pub results_per_query: u32,

    /// Maximum references returned per query.
    #[serde(default = "default_max_references")]
    pub max_references: usize,

    /// Hosts denied in addition to the built-in list.
    #[serde(default)]
    pub extra_deny_hosts: Vec<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            endpoint: default_search_endpoint(),
            results_per_query: default_results_per_query(),
            max_references: default_max_references(),
            extra_deny_hosts: Vec::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_search_key_env() -> String {
    "SERPER_API_KEY".into()
}
fn default_search_endpoint() -> String {
    "https://google.serper.dev/search".into()
}
fn default_results_per_query() -> u32 {
    10
}
fn default_max_references() -> usize {
    2
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Active backend. Overridden by `LLM_PROVIDER`.
    #[serde(default = "default_provider")]
    pub provider: LlmProvider,

    /// Output format. Overridden by `REWRITE_FORMAT`.
    #[serde(default)]
    pub format: RewriteFormat,

    /// Model override applied to whichever provider is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Request timeout in seconds for generation calls.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            format: RewriteFormat::default(),
            model: None,
            openai: OpenAiConfig::default(),
            gemini: GeminiConfig::default(),
            openrouter: OpenRouterConfig::default(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_provider() -> LlmProvider {
    LlmProvider::OpenRouter
}
fn default_llm_timeout_secs() -> u64 {
    120
}

/// `[llm.openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openai_key_env(),
            model: default_openai_model(),
            base_url: default_openai_base_url(),
        }
    }
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_openai_model() -> String {
    "gpt-4o-mini".into()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".into()
}

/// `[llm.gemini]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_gemini_key_env(),
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
        }
    }
}

fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_gemini_model() -> String {
    "gemini-1.5-flash".into()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}

/// `[llm.openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    #[serde(default = "default_openrouter_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_openrouter_model")]
    pub model: String,
    #[serde(default = "default_openrouter_base_url")]
    pub base_url: String,
    /// Sent as `HTTP-Referer`.
    #[serde(default = "default_site_url")]
    pub site_url: String,
    /// Sent as `X-Title`.
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openrouter_key_env(),
            model: default_openrouter_model(),
            base_url: default_openrouter_base_url(),
            site_url: default_site_url(),
            app_name: default_app_name(),
        }
    }
}

fn default_openrouter_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_openrouter_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_openrouter_base_url() -> String {
    "https://openrouter.ai".into()
}
fn default_site_url() -> String {
    "http://localhost".into()
}
fn default_app_name() -> String {
    "beyondchats-blogs".into()
}

/// `[extractor]` section: the main-content selector policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Containers tried in order; the first match wins.
    #[serde(default = "default_container_selectors")]
    pub container_selectors: Vec<String>,

    /// Subtrees removed from the chosen container.
    #[serde(default = "default_boilerplate_selectors")]
    pub boilerplate_selectors: Vec<String>,

    #[serde(default = "default_browser_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            container_selectors: default_container_selectors(),
            boilerplate_selectors: default_boilerplate_selectors(),
            user_agent: default_browser_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Ordered main-content containers.
pub fn default_container_selectors() -> Vec<String> {
    [
        "main",
        "article",
        r#"[role="main"]"#,
        "#content",
        ".post-content",
        ".entry-content",
        ".article-content",
        ".content",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Boilerplate tags stripped before extraction.
pub fn default_boilerplate_selectors() -> Vec<String> {
    ["header", "footer", "nav", "aside", "script", "style", "noscript"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_browser_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123 Safari/537.36".into()
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Titles overlapping a processed title by more than this are skipped.
    #[serde(default = "default_overlap_threshold")]
    pub overlap_threshold: f64,

    /// Minimum references required before rewriting.
    #[serde(default = "default_min_references")]
    pub min_references: usize,

    /// Pause after each search query variant.
    #[serde(default = "default_query_delay_ms")]
    pub query_delay_ms: u64,

    /// Pause between articles.
    #[serde(default = "default_article_delay_ms")]
    pub article_delay_ms: u64,

    /// Stop after the first article that found enough references.
    /// Overridden by `PROCESS_ONLY_ONE`.
    #[serde(default)]
    pub process_only_one: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            overlap_threshold: default_overlap_threshold(),
            min_references: default_min_references(),
            query_delay_ms: default_query_delay_ms(),
            article_delay_ms: default_article_delay_ms(),
            process_only_one: false,
        }
    }
}

fn default_overlap_threshold() -> f64 {
    0.8
}
fn default_min_references() -> usize {
    2
}
fn default_query_delay_ms() -> u64 {
    250
}
fn default_article_delay_ms() -> u64 {
    300
}

/// `[seed]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Blog index whose last listing pages hold the oldest posts.
    #[serde(default = "default_blog_index_url")]
    pub blog_index_url: String,

    /// Originals to seed when no limit is given.
    #[serde(default = "default_seed_limit")]
    pub default_limit: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            blog_index_url: default_blog_index_url(),
            default_limit: default_seed_limit(),
        }
    }
}

fn default_blog_index_url() -> String {
    "https://beyondchats.com/blogs/".into()
}
fn default_seed_limit() -> usize {
    5
}

// ---------------------------------------------------------------------------
// Environment overrides
// ---------------------------------------------------------------------------

/// `1`, `true`, `yes`, `y`, `on` (case-insensitive).
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

impl AppConfig {
    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides using `lookup` as the environment.
    ///
    /// Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(port) = get("PORT") {
            let port = port
                .parse::<u16>()
                .map_err(|e| BlogRefreshError::config(format!("invalid PORT '{port}': {e}")))?;
            self.store.port = Some(port);
        }
        if let Some(url) = get("ARTICLE_STORE_URL") {
            self.store.base_url = Some(url);
        }
        if let Some(provider) = get("LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
        }
        if let Some(format) = get("REWRITE_FORMAT") {
            self.llm.format = format.parse()?;
        }
        if let Some(flag) = lookup("PROCESS_ONLY_ONE") {
            self.pipeline.process_only_one = is_truthy(&flag);
        }
        if let Some(model) = get("OPENAI_MODEL") {
            self.llm.openai.model = model;
        }
        if let Some(model) = get("GEMINI_MODEL") {
            self.llm.gemini.model = model;
        }
        if let Some(model) = get("OPENROUTER_MODEL") {
            self.llm.openrouter.model = model;
        }
        if let Some(site) = get("OPENROUTER_SITE_URL") {
            self.llm.openrouter.site_url = site;
        }
        if let Some(app) = get("OPENROUTER_APP_NAME") {
            self.llm.openrouter.app_name = app;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.blogrefresh/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BlogRefreshError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.blogrefresh/blogrefresh.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BlogRefreshError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        BlogRefreshError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| BlogRefreshError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| BlogRefreshError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BlogRefreshError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read an API key from the env var `var_name`.
///
/// `hint` is appended to the error when the variable is unset or empty.
pub fn resolve_api_key(var_name: &str, hint: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => {
            let mut message = format!("{var_name} is not set");
            if !hint.is_empty() {
                message.push_str(". ");
                message.push_str(hint);
            }
            Err(BlogRefreshError::config(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("SERPER_API_KEY"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
        assert!(toml_str.contains("overlap_threshold"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.pipeline.min_references, 2);
        assert_eq!(parsed.llm.provider, LlmProvider::OpenRouter);
        assert_eq!(parsed.extractor.container_selectors[0], "main");
        assert_eq!(parsed.seed.blog_index_url, "https://beyondchats.com/blogs/");
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let toml_str = r#"
[store]
port = 5000

[llm]
provider = "gemini"
format = "html"

[llm.openai]
model = "gpt-4.1"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.store.port, Some(5000));
        assert_eq!(config.llm.provider, LlmProvider::Gemini);
        assert_eq!(config.llm.format, RewriteFormat::Html);
        assert_eq!(config.llm.openai.model, "gpt-4.1");
        assert_eq!(config.llm.openai.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.pipeline.article_delay_ms, 300);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config
            .apply_env_from(env(&[
                ("PORT", "5001"),
                ("LLM_PROVIDER", "openai"),
                ("REWRITE_FORMAT", "HTML"),
                ("PROCESS_ONLY_ONE", "Yes"),
                ("OPENAI_MODEL", "gpt-4o"),
            ]))
            .expect("apply env");
        assert_eq!(config.store.port, Some(5001));
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert_eq!(config.llm.format, RewriteFormat::Html);
        assert!(config.pipeline.process_only_one);
        assert_eq!(config.llm.openai.model, "gpt-4o");
    }

    #[test]
    fn unsupported_provider_in_env_is_config_error() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env_from(env(&[("LLM_PROVIDER", "mystery")]))
            .unwrap_err();
        assert!(matches!(err, BlogRefreshError::Config { .. }));
    }

    #[test]
    fn truthy_values() {
        for v in ["1", "true", "YES", "y", "On"] {
            assert!(is_truthy(v), "{v} should be truthy");
        }
        for v in ["", "0", "false", "no", "maybe"] {
            assert!(!is_truthy(v), "{v} should not be truthy");
        }
    }

    #[test]
    fn store_base_url_resolution() {
        let mut store = StoreConfig::default();
        assert!(store.resolved_base_url().is_err());

        store.port = Some(5000);
        assert_eq!(store.resolved_base_url().unwrap(), "http://localhost:5000");

        store.base_url = Some("http://127.0.0.1:9000/".into());
        assert_eq!(store.resolved_base_url().unwrap(), "http://127.0.0.1:9000");
    }

    #[test]
    fn api_key_resolution() {
        // Use a unique env var name to avoid interfering with other tests
        let result = resolve_api_key("BR_TEST_NONEXISTENT_KEY_12345", "try another provider");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("BR_TEST_NONEXISTENT_KEY_12345 is not set"));
        assert!(err.contains("try another provider"));
    }
}
