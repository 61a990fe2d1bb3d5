//! CLI entry point for the Chord shell.

use clap::Parser;
use cli::CliConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::telemetry::init();
    let config = CliConfig::parse();
    config.run().await
}
