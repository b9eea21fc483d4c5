//! Platter CLI - find recipes by photo.
//!
//! Platter embeds a query image, reduces the embedding, and looks up the
//! nearest images in a prebuilt catalog. Results are printed as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Five closest catalog images for a photo
//! platter search dinner.jpg -k 5
//!
//! # Attach recipes and write JSON lines to a file
//! platter search dinner.jpg --recipes recipes.jsonl --format jsonl --output hits.jsonl
//!
//! # Check a bundle before serving it
//! platter bundle verify --bundle ./bundle
//!
//! # View configuration
//! platter config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Platter - find recipes by photo.
#[derive(Parser, Debug)]
#[command(name = "platter")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Find the catalog images closest to a photo
    Search(cli::search::SearchArgs),

    /// Inspect and verify artifact bundles
    Bundle(cli::bundle::BundleArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't up yet, so config warnings go straight to stderr.
    let config = match platter_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `platter config path`."
            );
            platter_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Platter v{}", platter_core::VERSION);

    match cli.command {
        Commands::Search(args) => cli::search::execute(config, args).await,
        Commands::Bundle(args) => cli::bundle::execute(config, args).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
