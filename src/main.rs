// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber for logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Vercmp { left, right } => commands::cmd_vercmp(&left, &right),
        Commands::Parse { expression } => commands::cmd_parse(&expression),
        Commands::Copy {
            store,
            request,
            config,
            write,
        } => commands::cmd_copy(&store, &request, config.as_deref(), write),
    }
}
