//! Clippress CLI — publish captured web content to a cloud document.
//!
//! Reads a clip (text with inline `![alt](url)` image markers), creates a
//! document in the configured cloud-document service, and re-hosts the
//! referenced images there.

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
