//! Shelf - shared offline cache for multi-app deployments
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use shelf::cli::{commands, Cli, Commands};
use shelf::config::{Config, ConfigManager};
use shelf::error::ShelfResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

/// 0 = warn, 1 = info, 2+ = debug
fn init_logging(verbose: u8, config: Option<&Config>) {
    let filter = match verbose {
        0 => EnvFilter::new("shelf=warn"),
        1 => EnvFilter::new("shelf=info"),
        _ => EnvFilter::new("shelf=debug"),
    };

    let json = config.is_some_and(|c| c.general.log_format == "json");
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}

async fn run() -> ShelfResult<()> {
    let cli = Cli::parse();

    let manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    // Config commands must work even when the file on disk is invalid
    let command = match cli.command {
        Commands::Config(args) => {
            init_logging(cli.verbose, None);
            return commands::config(args, &manager).await;
        }
        command => command,
    };

    let config = manager.load().await?;
    init_logging(cli.verbose, Some(&config));

    match command {
        Commands::Config(args) => commands::config(args, &manager).await,
        Commands::Install => commands::install(&config).await,
        Commands::Activate => commands::activate(&config).await,
        Commands::Update => commands::update(&config).await,
        Commands::Status(args) => commands::status(args, &config).await,
        Commands::Fetch(args) => commands::fetch(args, &config).await,
        Commands::Resolve(args) => commands::resolve(args, &config).await,
        Commands::Partitions(args) => commands::partitions(args, &config).await,
        Commands::Records(args) => commands::records(args, &config).await,
    }
}
