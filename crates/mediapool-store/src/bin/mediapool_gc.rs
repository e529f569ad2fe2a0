//! mediapool-gc CLI
//!
//! Maintenance commands for a mediapool store:
//! - Listing files no item references
//! - Deleting those files
//! - Printing pool statistics

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use mediapool_store::{logging, Catalog, StoreConfig};

#[derive(Parser)]
#[command(name = "mediapool-gc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Garbage-collect and inspect a mediapool store")]
struct Cli {
    /// Config file (TOML, or JSON with a .json extension)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Store root; overrides the config file
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List files that no item references
    Orphans,
    /// Delete files that no item references
    Clean,
    /// Print item and tag counts
    Stats {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn load_config(cli: &Cli) -> Result<StoreConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli)?;
    let catalog = Catalog::open(config).await?;

    match cli.command {
        Commands::Orphans => {
            for file in catalog.collect_unreferenced_files().await? {
                println!("{}", file);
            }
        }
        Commands::Clean => {
            let removed = catalog.clean_unreferenced_files().await?;
            for file in &removed {
                println!("removed {}", file);
            }
            println!("{} file(s) removed", removed.len());
        }
        Commands::Stats { json } => {
            let stats = catalog.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("items: {} (latest id {})", stats.items, stats.latest_item_id);
                println!("tags:  {} (latest id {})", stats.tags, stats.latest_tag_id);
            }
        }
    }

    catalog.close().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
