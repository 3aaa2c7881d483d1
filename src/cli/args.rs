//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Postroom - offline and bootstrap tooling for the admin mail pages
///
/// Plans page module initialization and drives the offline cache worker
/// against a local cache directory.
#[derive(Parser, Debug)]
#[command(name = "postroom")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "POSTROOM_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the module initialization order
    Plan,

    /// Manage the offline cache
    Cache(CacheArgs),

    /// Run a request through the offline worker
    Fetch(FetchArgs),

    /// Show worker registration and cache partitions
    Status,

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Install the worker and precache the application shell
    Install,

    /// Activate a waiting worker and prune stale partitions
    Activate,

    /// List cache partitions and entry counts
    List,

    /// Delete cache partitions and the worker registration
    Clear {
        /// Only delete this partition
        #[arg(short, long)]
        partition: Option<String>,
    },
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Absolute URL to request
    pub url: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Treat the request as a top-level page navigation
    #[arg(long)]
    pub navigate: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}
