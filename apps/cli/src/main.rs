//! blogrefresh CLI: rewrite stored blog articles using fresh web references.
//!
//! Seeds originals from the source blog, finds reference articles for each,
//! asks an LLM for an updated version and publishes it as a derivative.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    // A missing .env is fine; real env vars still apply.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
