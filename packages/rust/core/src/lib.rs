//! Run orchestration for blogrefresh.
//!
//! This crate ties search, extraction, rewriting, and publishing together
//! into the rewrite run ([`Pipeline`]) and seeds originals from the source
//! blog ([`Seeder`]).

pub mod dedup;
pub mod pipeline;
pub mod seed;

pub use dedup::{TopicGate, normalize_title, title_word_set, word_overlap_ratio};
pub use pipeline::{
    ArticleOutcome, Pipeline, ProgressReporter, SilentProgress, SkipReason, query_variants,
};
pub use seed::{SeedReport, Seeder};
