//! Symlab CLI — symphony collection and aggregation commands.
//!
//! Commands:
//! - `extract` — list symphonies discovered in local chat export files
//! - `run` — full pipeline: fetch metadata and backtests, write CSV datasets
//! - `aggregate` — recompute the stats CSVs from responses already on disk

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use symlab_core::api::ComposerClient;
use symlab_core::extract::extract_symphonies;
use symlab_runner::{aggregate_from_disk, run_collection, CollectConfig, FixedDelay};

#[derive(Parser)]
#[command(
    name = "symlab",
    about = "Symlab CLI — symphony backtest collection pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List symphonies discovered in local chat export files.
    Extract {
        /// Directory of export JSON files.
        #[arg(long)]
        export_dir: PathBuf,
    },
    /// Run the full pipeline from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,
    },
    /// Recompute the stats CSVs from persisted responses, no network.
    Aggregate {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Extract { export_dir } => extract(&export_dir),
        Commands::Run { config } => run(&config),
        Commands::Aggregate { config } => aggregate(&config),
    }
}

fn extract(export_dir: &std::path::Path) -> Result<()> {
    let records = extract_symphonies(export_dir).context("extracting symphonies")?;
    for record in records.values() {
        println!("{}  {}  by {}", record.id, record.title, record.author);
    }
    println!("{} symphonies discovered", records.len());
    Ok(())
}

fn run(config_path: &std::path::Path) -> Result<()> {
    let config = CollectConfig::from_file(config_path).context("loading config")?;
    let api = ComposerClient::new();
    let mut pacer = FixedDelay::one_second();

    let summary = run_collection(&config, &api, &mut pacer)?;

    println!("discovered:         {}", summary.discovered);
    println!("processed:          {}", summary.processed);
    println!("symphony failures:  {}", summary.symphony_failures.len());
    for failure in &summary.symphony_failures {
        println!("  [{}] {} (status {})", failure.index, failure.id, failure.status);
    }
    println!("backtest failures:  {}", summary.backtest_failures.len());
    for failure in &summary.backtest_failures {
        println!("  [{}] {} (status {})", failure.index, failure.id, failure.status);
    }
    for path in &summary.csv_paths {
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn aggregate(config_path: &std::path::Path) -> Result<()> {
    let config = CollectConfig::from_file(config_path).context("loading config")?;
    let paths = aggregate_from_disk(&config)?;
    for path in &paths {
        println!("wrote {}", path.display());
    }
    Ok(())
}
