//! Postroom CLI entry point

use clap::Parser;
use console::style;
use postroom::cli::{Cli, Commands};
use postroom::config::ConfigManager;
use postroom::error::PostroomResult;
use std::process::ExitCode;
use tracing::debug;
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

async fn run() -> PostroomResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("postroom=warn"),
        1 => EnvFilter::new("postroom=info"),
        _ => EnvFilter::new("postroom=debug"),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if config.general.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.without_time().init();
    }

    debug!("Using config {}", config_manager.path().display());

    match cli.command {
        Commands::Plan => postroom::cli::commands::plan(&config).await,
        Commands::Cache(args) => postroom::cli::commands::cache(args, &config).await,
        Commands::Fetch(args) => postroom::cli::commands::fetch(args, &config).await,
        Commands::Status => postroom::cli::commands::status(&config).await,
        Commands::Config(args) => {
            postroom::cli::commands::config(args, &config, &config_manager).await
        }
    }
}
