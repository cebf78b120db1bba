//! Lookalike CLI - image-based similar-product recommendations.
//!
//! # Usage
//!
//! ```bash
//! # Split a catalog into per-item metadata records
//! lookalike import catalog.jsonl
//!
//! # Build the index (if absent) and compute similar products for every item
//! lookalike run -k 10 --workers 4
//!
//! # Rebuild the index from scratch
//! lookalike build-index --force
//!
//! # Inspect results
//! lookalike show 1234
//! lookalike stats
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use lookalike_cli::{OutputFormat, commands, output};
use lookalike_core::{ItemId, LookalikeConfig};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "lookalike")]
#[command(about = "Lookalike - image-based similar products for a catalog", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "LOOKALIKE_CONFIG")]
    config: Option<PathBuf>,

    /// Output format (human, json, plain)
    #[arg(long, global = true, default_value = "human")]
    format: OutputFormatArg,

    /// Number of concurrent neighbor workers
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    /// Number of similar products per item
    #[arg(short, global = true)]
    k: Option<usize>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormatArg {
    Human,
    Json,
    Plain,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Plain => OutputFormat::Plain,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index if absent, then compute similar products for every item
    Run,

    /// Build and persist the index only
    BuildIndex {
        /// Rebuild even if a persisted index exists
        #[arg(long)]
        force: bool,
    },

    /// Split a JSON Lines catalog into per-item metadata records
    Import {
        /// Catalog file, one item object per line
        catalog: PathBuf,
    },

    /// Show the stored similar products of an item
    Show {
        /// Item ID
        id: ItemId,
    },

    /// Show persisted index statistics
    Stats,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        output::error(format!("{:#}", e));
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = LookalikeConfig::load_or_default(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;

    if let Some(k) = cli.k {
        config.neighbors.k = k;
    }
    if let Some(workers) = cli.workers {
        config.neighbors.workers = workers;
    }
    config.validate().context("Invalid command-line overrides")?;

    init_logging(cli.verbose, &config.general.log_level);

    let format = OutputFormat::from(cli.format);
    if format == OutputFormat::Plain {
        console::set_colors_enabled(false);
    }

    match cli.command {
        Commands::Run => {
            commands::run_all(&config, format).await?;
        }
        Commands::BuildIndex { force } => {
            commands::build_index(&config, force, format).await?;
        }
        Commands::Import { catalog } => {
            commands::import_catalog(&config, &catalog, format).await?;
        }
        Commands::Show { id } => {
            commands::show(&config, &id, format).await?;
        }
        Commands::Stats => {
            commands::stats(&config, format).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, level: &str) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let crates = [
        "lookalike",
        "lookalike_cli",
        "lookalike_core",
        "lookalike_index",
        "lookalike_neighbors",
    ];
    let directives = |level: &str| {
        let mut spec: Vec<String> = crates.iter().map(|c| format!("{c}={level}")).collect();
        spec.push("warn".to_string());
        spec.join(",")
    };

    let filter = if verbose {
        EnvFilter::new(directives("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(level)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
