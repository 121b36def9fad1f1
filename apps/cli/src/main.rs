//! Ladle CLI: recursive, config-driven content pipeline.
//!
//! Fetches documents (cache first or live, per policy), parses them by page
//! type, and transforms the results into more work or terminal records.

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
