//! Shared types, error model, and configuration for blogrefresh.
//!
//! This crate is the foundation depended on by all other blogrefresh crates.
//! It provides:
//! - [`BlogRefreshError`]: the unified error type
//! - Domain types ([`Article`], [`Reference`], [`ReferenceArticle`], [`RunSummary`])
//! - Configuration ([`AppConfig`], env overrides, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ExtractorConfig, GeminiConfig, LlmConfig, OpenAiConfig, OpenRouterConfig,
    PipelineSettings, SearchConfig, SeedConfig, StoreConfig, config_dir, config_file_path,
    default_boilerplate_selectors, default_container_selectors, init_config, is_truthy,
    load_config, load_config_from, resolve_api_key,
};
pub use error::{BlogRefreshError, Result};
pub use types::{
    Article, LlmProvider, NewArticle, OutputMode, Reference, ReferenceArticle, RewriteFormat,
    RunSummary,
};
