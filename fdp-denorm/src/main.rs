//! fdp-denorm - Catch batch denormalization CLI
//!
//! Reads one catch batch tree from a JSON file, denormalizes it with the
//! given options and prints the flat result as JSON. Intended for data
//! inspection and regression debugging; runs offline (no conversion
//! lookups), so RTP and alive weights stay disabled unless an options
//! file provides them.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use fdp_common::config::JobConfig;
use fdp_common::BatchNode;
use fdp_denorm::conversion::NoConversions;
use fdp_denorm::{flatten, DenormalizationEngine, DenormalizationOptions};

#[derive(Parser, Debug)]
#[command(name = "fdp-denorm", about = "Denormalize a catch batch tree")]
struct Cli {
    /// JSON file holding one catch batch tree
    #[arg(long)]
    tree: PathBuf,

    /// Job configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Denormalization options file (TOML); defaults used when absent
    #[arg(long)]
    options: Option<PathBuf>,

    /// Print the ASCII tree dump instead of JSON
    #[arg(long)]
    dump: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting FDP denormalizer v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();

    let config = JobConfig::load(cli.config.as_deref())?;
    config.validate()?;

    let mut options = match &cli.options {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Cannot read options file {}", path.display()))?;
            toml::from_str::<DenormalizationOptions>(&content)
                .with_context(|| format!("Cannot parse options file {}", path.display()))?
        }
        None => DenormalizationOptions::default(),
    };
    options.max_elevation_passes = config.max_elevation_passes;

    let content = std::fs::read_to_string(&cli.tree)
        .with_context(|| format!("Cannot read tree file {}", cli.tree.display()))?;
    let tree: BatchNode = serde_json::from_str(&content)
        .with_context(|| format!("Cannot parse tree file {}", cli.tree.display()))?;
    info!("Loaded tree #{} with {} node(s)", tree.id, tree.count());

    let engine = DenormalizationEngine::new(Arc::new(NoConversions));
    let flat = engine.denormalize(&tree, &options)?;
    info!("Denormalized into {} record(s)", flat.len());

    if cli.dump {
        print!("{}", flatten::dump(&flat));
    } else {
        println!("{}", serde_json::to_string_pretty(&flat)?);
    }
    Ok(())
}
