//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use blogrefresh_core::{ArticleOutcome, Pipeline, ProgressReporter, Seeder};
use blogrefresh_extractor::ContentExtractor;
use blogrefresh_search::ReferenceSearch;
use blogrefresh_shared::{
    AppConfig, Article, LlmProvider, OutputMode, RewriteFormat, RunSummary, init_config,
    load_config, load_config_from,
};
use blogrefresh_store::ArticleStore;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// blogrefresh: refresh blog articles with up-to-date references.
#[derive(Parser)]
#[command(
    name = "blogrefresh",
    version,
    about = "Rewrite stored blog articles using top-ranking web references.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.blogrefresh/blogrefresh.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Rewrite every original that has no updated version yet.
    Run {
        /// Stop after the first article that found enough references.
        #[arg(long)]
        only_one: bool,

        /// LLM provider: openai, gemini, or openrouter.
        #[arg(long)]
        provider: Option<String>,

        /// Output format: markdown or html.
        #[arg(long)]
        format: Option<String>,

        /// Model override for the active provider.
        #[arg(long)]
        model: Option<String>,
    },

    /// Scrape the oldest posts of the source blog into the store.
    Seed {
        /// Number of originals to seed (1-20).
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Ask the article store to seed originals itself.
    Extract {
        /// Number of originals to extract.
        #[arg(short, long, default_value = "5")]
        limit: u32,
    },

    /// List stored articles.
    List,

    /// Print one article as JSON.
    Show {
        /// Article id.
        id: String,
    },

    /// Delete one article.
    Delete {
        /// Article id.
        id: String,
    },

    /// Run one reference search and print the selected results.
    Search {
        /// Search query.
        query: String,
    },

    /// Fetch a page and print its main content.
    Scrape {
        /// Page URL.
        url: String,

        /// Output mode: text or html.
        #[arg(short, long, default_value = "text")]
        output: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

const LOG_TARGETS: &[&str] = &[
    "blogrefresh",
    "blogrefresh_core",
    "blogrefresh_search",
    "blogrefresh_extractor",
    "blogrefresh_rewrite",
    "blogrefresh_store",
    "blogrefresh_shared",
];

/// Initialize tracing based on CLI flags. `RUST_LOG` wins when set.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&resolve_config(cli.config.as_deref())?),
        };
    }

    let mut config = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Command::Run {
            only_one,
            provider,
            format,
            model,
        } => {
            apply_run_flags(&mut config, only_one, provider, format, model)?;
            cmd_run(&config).await
        }
        Command::Seed { limit } => cmd_seed(&config, limit).await,
        Command::Extract { limit } => cmd_extract(&config, limit).await,
        Command::List => cmd_list(&config).await,
        Command::Show { id } => cmd_show(&config, &id).await,
        Command::Delete { id } => cmd_delete(&config, &id).await,
        Command::Search { query } => cmd_search(&config, &query).await,
        Command::Scrape { url, output } => cmd_scrape(&config, &url, &output).await,
        Command::Config { .. } => Ok(()),
    }
}

/// File (or defaults), then environment overrides.
fn resolve_config(path: Option<&std::path::Path>) -> Result<AppConfig> {
    let mut config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    config.apply_env_overrides()?;
    Ok(config)
}

/// CLI flags are applied last.
fn apply_run_flags(
    config: &mut AppConfig,
    only_one: bool,
    provider: Option<String>,
    format: Option<String>,
    model: Option<String>,
) -> Result<()> {
    if only_one {
        config.pipeline.process_only_one = true;
    }
    if let Some(provider) = provider {
        config.llm.provider = provider.parse::<LlmProvider>()?;
    }
    if let Some(format) = format {
        config.llm.format = format.parse::<RewriteFormat>()?;
    }
    if let Some(model) = model {
        config.llm.model = Some(model);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config: &AppConfig) -> Result<()> {
    let pipeline = Pipeline::from_config(config)?;

    info!(
        provider = %config.llm.provider.as_str(),
        format = %config.llm.format.as_str(),
        only_one = config.pipeline.process_only_one,
        "starting rewrite run"
    );

    let reporter = CliProgress::new();
    let summary = pipeline.run(&reporter).await?;

    println!();
    println!("  Run complete");
    println!("  Processed: {}", summary.processed);
    println!("  Succeeded: {}", summary.succeeded);
    println!("  Failed:    {}", summary.failed);
    println!("  Skipped:   {}", summary.skipped);
    println!();

    Ok(())
}

async fn cmd_seed(config: &AppConfig, limit: Option<usize>) -> Result<()> {
    let store = ArticleStore::from_config(&config.store)?;
    let extractor = ContentExtractor::new(&config.extractor)?;
    let seeder = Seeder::new(&store, &extractor, &config.seed.blog_index_url)?;

    let limit = limit.unwrap_or(config.seed.default_limit);
    info!(limit, index = %config.seed.blog_index_url, "seeding originals");

    let report = seeder.seed_oldest(limit).await?;

    println!();
    if report.from_store {
        println!("  Store already holds {} seeded originals", report.originals.len());
    } else {
        println!("  Seeding complete");
        println!("  Saved:   {}", report.saved);
        println!("  Skipped: {}", report.skipped);
    }
    for article in &report.originals {
        println!("  {}  {}", article.id, article.title);
    }
    println!();

    Ok(())
}

async fn cmd_extract(config: &AppConfig, limit: u32) -> Result<()> {
    let store = ArticleStore::from_config(&config.store)?;
    let reply = store.extract_oldest(limit).await?;

    println!();
    println!("  Saved:   {}", reply.meta.saved);
    println!("  Skipped: {}", reply.meta.skipped);
    for article in &reply.originals {
        println!("  {}  {}", article.id, article.title);
    }
    println!();

    Ok(())
}

async fn cmd_list(config: &AppConfig) -> Result<()> {
    let store = ArticleStore::from_config(&config.store)?;
    let articles = store.list_articles().await?;

    if articles.is_empty() {
        println!("No articles in the store.");
        return Ok(());
    }

    for article in &articles {
        println!("{}", list_line(article));
    }
    Ok(())
}

fn list_line(article: &Article) -> String {
    match (&article.original_article_id, article.is_updated_version) {
        (Some(original), true) => {
            format!("{}  updated   {}  (of {original})", article.id, article.title)
        }
        _ => format!("{}  original  {}", article.id, article.title),
    }
}

async fn cmd_show(config: &AppConfig, id: &str) -> Result<()> {
    let store = ArticleStore::from_config(&config.store)?;
    let article = store.get_article(id).await?;
    println!("{}", serde_json::to_string_pretty(&article)?);
    Ok(())
}

async fn cmd_delete(config: &AppConfig, id: &str) -> Result<()> {
    let store = ArticleStore::from_config(&config.store)?;
    store.delete_article(id).await?;
    println!("Deleted {id}");
    Ok(())
}

async fn cmd_search(config: &AppConfig, query: &str) -> Result<()> {
    let search = ReferenceSearch::from_config(&config.search)?;
    let references = search.search(query).await?;

    if references.is_empty() {
        println!("No usable references for '{query}'.");
        return Ok(());
    }
    for (i, reference) in references.iter().enumerate() {
        println!("{}. {}", i + 1, reference.title);
        println!("   {}", reference.url);
    }
    Ok(())
}

async fn cmd_scrape(config: &AppConfig, url: &str, output: &str) -> Result<()> {
    let mode: OutputMode = output.parse()?;
    let extractor = ContentExtractor::new(&config.extractor)?;
    let content = extractor.scrape(url, mode).await?;

    if content.is_empty() {
        return Err(eyre!("no content extracted from {url}"));
    }
    println!("{content}");
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("valid progress template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn started(&self, total: usize) {
        self.spinner.set_message(format!("{total} originals to process"));
    }

    fn article_started(&self, index: usize, total: usize, title: &str) {
        self.spinner.set_message(format!("[{index}/{total}] {title}"));
    }

    fn article_finished(&self, index: usize, total: usize, title: &str, outcome: &ArticleOutcome) {
        let status = match outcome {
            ArticleOutcome::Succeeded { derivative_id } => format!("updated -> {derivative_id}"),
            ArticleOutcome::Failed { error } => format!("failed: {error}"),
            ArticleOutcome::Skipped(reason) => format!("skipped: {reason}"),
        };
        self.spinner.println(format!("  [{index}/{total}] {title}: {status}"));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}
