//! DialogueGen CLI: turn lesson documents into a two-speaker dialogue corpus.
//!
//! Reads PDF/Office lessons from an input directory, asks a generation model
//! for short dialogues grounded in them, and writes one JSON artifact per run.

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
