//! SdgScan CLI: classify local sustainability reports against the UN SDGs.
//!
//! Normalizes text, image and audio reports into issues, grounds each one in
//! a local knowledge base, and prints a JSON report of the model's analyses.

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
