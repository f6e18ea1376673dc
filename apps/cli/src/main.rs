//! CoralIngest CLI — real-estate listing ingestion tool.
//!
//! Visits listing pages in a real browser, normalizes what they render,
//! and reconciles the results into a local listings database with photos.

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
