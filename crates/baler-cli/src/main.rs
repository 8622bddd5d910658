//! baler - build conda packages for pure-Python projects

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use baler_cli::cmd;
use baler_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let opts = cmd::BuildOptions::from_cli(&cli);

    match cli.command {
        Commands::Build => cmd::build::build(&opts).await,
        Commands::Publish => cmd::publish::publish(&opts).await,
    }
}
