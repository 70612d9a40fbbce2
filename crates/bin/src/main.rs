use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod output;
mod session;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("treesync=info".parse()?))
        .init();

    match &cli.command {
        Commands::Serve(args) => commands::serve::run(args).await,
        Commands::Watch(args) => commands::watch::run(args).await,
        Commands::Dump(args) => commands::watch::dump(args).await,
        Commands::Set(args) => commands::write::set(args).await,
        Commands::Remove(args) => commands::write::remove(args).await,
        Commands::Health(args) => commands::health::run(args).await,
    }
}
