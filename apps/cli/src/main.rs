//! Newsdesk CLI: sync world-news headlines into a local store.
//!
//! Pulls article listings from the configured publishers, fetches what is
//! new, optionally summarizes it, and exports stored items as JSON.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
